use std::sync::OnceLock;

use regex::Regex;

use crate::{
    connection::{Config, Credentials, MailerConnection, Server},
    error::{Result, SmtpError, SmtpResult},
    logger::Logger,
    mail::Mail,
};

/// Delivers one assembled message. Any `Err` counts as a failed attempt.
pub trait Transport {
    fn send(&mut self, mail: &Mail) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, mail: &Mail) -> Result<()> {
        (**self).send(mail)
    }
}

/// Local part is RFC 5322 dot-atom text; domain labels may be internationalised.
const ADDRESS_PATTERN: &str = concat!(
    r"^[a-z0-9!#$%&'*+/=?^_`{|}~\-]+(\.[a-z0-9!#$%&'*+/=?^_`{|}~\-]+)*",
    r"@([\p{L}\p{N}]+(-+[\p{L}\p{N}]+)*\.)+(\p{L}{2,}|xn--[a-z0-9\-]+)$",
);

fn address_pattern() -> SmtpResult<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(ADDRESS_PATTERN))
        .as_ref()
        .map_err(|err| SmtpError::AddressPattern(err.clone()))
}

/// Rejects addresses the server would certainly refuse.
pub fn check_address(address: &str) -> SmtpResult<()> {
    if address_pattern()?.is_match(&address.to_lowercase()) {
        Ok(())
    } else {
        Err(SmtpError::MailBoxName(address.to_string()))
    }
}

/// SMTP submission over a session that is opened on first use and kept for
/// the following messages. A failed transaction drops the session; the next
/// message reconnects.
pub struct SmtpTransport<L>
where
    L: Logger + Clone,
{
    server: Server,
    config: Config,
    credentials: Credentials,
    logger: L,
    connection: Option<MailerConnection<L>>,
}

impl<L> SmtpTransport<L>
where
    L: Logger + Clone,
{
    pub fn new(server: Server, config: Config, credentials: Credentials, logger: L) -> Self {
        SmtpTransport {
            server,
            config,
            credentials,
            logger,
            connection: None,
        }
    }

    fn connection(&mut self) -> SmtpResult<MailerConnection<L>> {
        match self.connection.take() {
            Some(connection) => Ok(connection),
            None => {
                tracing::debug!(
                    server = self.server.address(),
                    port = self.server.port(),
                    "opening smtp session"
                );
                MailerConnection::open(
                    &self.server,
                    &self.config,
                    &self.credentials,
                    self.logger.clone(),
                )
            }
        }
    }
}

impl<L> Transport for SmtpTransport<L>
where
    L: Logger + Clone,
{
    fn send(&mut self, mail: &Mail) -> Result<()> {
        check_address(&mail.from)?;
        check_address(&mail.to)?;

        let mut connection = self.connection()?;
        match connection.send_mail(mail) {
            Ok(()) => {
                self.connection = Some(connection);
                Ok(())
            }
            Err(err) => {
                connection.terminate();
                Err(err.into())
            }
        }
    }
}
