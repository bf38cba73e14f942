//! A blocking SMTP submission session.

mod parser;
mod protocol;

use std::{
    io::Write,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use rustls::{OwnedTrustAnchor, RootCertStore, ServerName};

use crate::{
    error::{SmtpError, SmtpResult},
    logger::Logger,
    mail::Mail,
};
use protocol::{auth_login_token, AuthMech, Command, EhloLine, Line, StatusCode};

type TlsCon = rustls::ClientConnection;

fn create_tls_conn(server_address: &str) -> SmtpResult<TlsCon> {
    let mut root_store = RootCertStore::empty();
    root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let name = ServerName::try_from(server_address)
        .map_err(|_| SmtpError::ServerName(server_address.to_string()))?;
    Ok(TlsCon::new(Arc::new(config), name)?)
}

#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Credentials {
        Credentials { username, password }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    timeout: u64,
}

impl Config {
    pub fn new() -> Config {
        Config { timeout: 30 }
    }

    pub fn timeout(&mut self, seconds: u64) {
        self.timeout = seconds;
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

#[derive(Debug, Clone)]
pub struct Server {
    address: String,
    port: u16,
    implicit_tls: bool,
}

impl Server {
    pub fn new(address: String, port: u16, implicit_tls: bool) -> Server {
        Server {
            address,
            port,
            implicit_tls,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn implicit_tls(&self) -> bool {
        self.implicit_tls
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Support {
    Supported,
    #[default]
    NotSupported,
}

/// What the server announced in its latest EHLO reply.
#[derive(Clone, Copy, Default)]
struct ServerMeta {
    tls: Support,
    pipelining: Support,
    auth_plain: Support,
    auth_login: Support,
}

/// An open, authenticated session. Sends QUIT when dropped.
pub struct MailerConnection<L>
where
    L: Logger,
{
    name: String,
    server: Server,
    meta: ServerMeta,
    tlscon: Option<TlsCon>,
    stream: TcpStream,
    logger: L,
    open: bool,
}

impl<L> MailerConnection<L>
where
    L: Logger,
{
    /// Connects, upgrades to TLS and authenticates.
    pub fn open(
        server: &Server,
        config: &Config,
        credentials: &Credentials,
        logger: L,
    ) -> SmtpResult<MailerConnection<L>> {
        let timeout = Duration::from_secs(config.timeout);
        let address = resolve(server)?;
        let stream = TcpStream::connect_timeout(&address, timeout)
            .map_err(|_| SmtpError::ServerUnreachable)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut connection = MailerConnection {
            name: "localhost".to_string(),
            server: server.clone(),
            meta: ServerMeta::default(),
            tlscon: None,
            stream,
            logger,
            open: true,
        };
        if let Err(err) = connection.establish(credentials) {
            connection.terminate();
            return Err(err);
        }
        Ok(connection)
    }

    fn establish(&mut self, credentials: &Credentials) -> SmtpResult<()> {
        if self.server.implicit_tls {
            self.tlscon = Some(create_tls_conn(&self.server.address)?);
        }
        let greeting = self.recv_line().map_err(|err| match err {
            SmtpError::Protocol => SmtpError::InvalidServer,
            err => err,
        })?;
        greeting.expect(StatusCode::ServiceReady)?;

        self.handshake()?;
        if !self.is_tls() && self.meta.tls == Support::Supported {
            self.start_tls()?;
            self.handshake()?;
        }
        if self.meta.auth_plain == Support::Supported {
            self.auth_plain(credentials)
        } else if self.meta.auth_login == Support::Supported {
            self.auth_login(credentials)
        } else {
            Ok(())
        }
    }

    fn is_tls(&self) -> bool {
        self.tlscon.is_some()
    }

    fn recv_reply(&mut self) -> SmtpResult<Vec<Line>> {
        let lines = match self.tlscon.as_mut() {
            Some(tlscon) => {
                let mut tls = rustls::Stream::new(tlscon, &mut self.stream);
                parser::Parser::new(&mut tls, &mut self.logger).recv_reply()?
            }
            None => parser::Parser::new(&mut self.stream, &mut self.logger).recv_reply()?,
        };
        if lines.iter().any(|l| unavailable(l.code())) {
            self.terminate();
            return Err(SmtpError::ServerUnavailable);
        }
        Ok(lines)
    }

    /// Reads a whole reply and returns its first line.
    fn recv_line(&mut self) -> SmtpResult<Line> {
        let mut lines = self.recv_reply()?;
        Ok(lines.swap_remove(0))
    }

    fn write(&mut self, data: &[u8]) -> SmtpResult<()> {
        match self.tlscon.as_mut() {
            Some(tlscon) => {
                let mut tls = rustls::Stream::new(tlscon, &mut self.stream);
                tls.write_all(data)?;
                tls.flush()?;
            }
            None => {
                self.stream.write_all(data)?;
                self.stream.flush()?;
            }
        }
        Ok(())
    }

    fn send(&mut self, cmd: Command<'_>) -> SmtpResult<()> {
        self.logger.client(cmd.transcript().as_bytes());
        self.write(cmd.to_string().as_bytes())
    }

    fn handshake(&mut self) -> SmtpResult<()> {
        let name = self.name.clone();
        self.send(Command::Ehlo(&name))?;
        let reply = self.recv_reply()?;

        self.meta = ServerMeta::default();
        for line in reply.iter() {
            line.expect(StatusCode::Okay)?;
            match EhloLine::parse(line.text()) {
                EhloLine::StartTls => self.meta.tls = Support::Supported,
                EhloLine::Pipelining => self.meta.pipelining = Support::Supported,
                EhloLine::Auth(mechs) => {
                    for mech in mechs {
                        match mech {
                            AuthMech::Plain => self.meta.auth_plain = Support::Supported,
                            AuthMech::Login => self.meta.auth_login = Support::Supported,
                        }
                    }
                }
                EhloLine::EightBitMime | EhloLine::Other => {}
            }
        }
        Ok(())
    }

    fn start_tls(&mut self) -> SmtpResult<()> {
        self.send(Command::StartTls)?;
        self.recv_line()?.expect(StatusCode::ServiceReady)?;
        self.tlscon = Some(create_tls_conn(&self.server.address)?);
        Ok(())
    }

    fn reply_auth_result(&mut self) -> SmtpResult<()> {
        match self.recv_line()?.code() {
            StatusCode::AuthSuccess => Ok(()),
            StatusCode::AuthInvalidCred | StatusCode::NoAccess => Err(SmtpError::InvalidCred),
            _ => Err(SmtpError::Protocol),
        }
    }

    fn auth_plain(&mut self, credentials: &Credentials) -> SmtpResult<()> {
        self.send(Command::AuthPlain(
            &credentials.username,
            &credentials.password,
        ))?;
        self.reply_auth_result()
    }

    fn auth_login(&mut self, credentials: &Credentials) -> SmtpResult<()> {
        self.send(Command::AuthLogin)?;
        self.recv_line()?.expect(StatusCode::ServerChallenge)?;
        self.logger.client(b"********\r\n");
        self.write(format!("{}\r\n", auth_login_token(&credentials.username)).as_bytes())?;
        self.recv_line()?.expect(StatusCode::ServerChallenge)?;
        self.logger.client(b"********\r\n");
        self.write(format!("{}\r\n", auth_login_token(&credentials.password)).as_bytes())?;
        self.reply_auth_result()
    }

    fn reply_mail_from(&mut self, from: &str) -> SmtpResult<()> {
        let line = self.recv_line()?;
        match line.code() {
            StatusCode::Okay => Ok(()),
            StatusCode::NoAccess => Err(SmtpError::Policy(line.text().to_string())),
            StatusCode::MailBoxNameNotAllowed => Err(SmtpError::MailBoxName(from.to_string())),
            _ => Err(SmtpError::Protocol),
        }
    }

    fn reply_rcpt_to(&mut self, to: &str) -> SmtpResult<()> {
        let line = self.recv_line()?;
        match line.code() {
            StatusCode::Okay | StatusCode::UserNotLocal => Ok(()),
            StatusCode::NoAccess | StatusCode::MailboxUnavailable => {
                Err(SmtpError::Policy(line.text().to_string()))
            }
            StatusCode::MailBoxNameNotAllowed => Err(SmtpError::MailBoxName(to.to_string())),
            StatusCode::UserNotLocalError => Err(SmtpError::Forward(line.text().to_string())),
            _ => Err(SmtpError::Protocol),
        }
    }

    fn reply_data(&mut self) -> SmtpResult<()> {
        self.recv_line()?.expect(StatusCode::StartMailInput)
    }

    fn payload(&mut self, mail: &Mail) -> SmtpResult<()> {
        let data = mail.data()?;
        self.logger
            .client(format!("<{} bytes of message data>\r\n", data.len()).as_bytes());
        self.write(&data)?;
        let line = self.recv_line()?;
        match line.code() {
            StatusCode::Okay => Ok(()),
            StatusCode::NoAccess | StatusCode::MailboxUnavailable => {
                Err(SmtpError::Policy(line.text().to_string()))
            }
            _ => Err(SmtpError::Protocol),
        }
    }

    /// One MAIL / RCPT / DATA transaction.
    pub fn send_mail(&mut self, mail: &Mail) -> SmtpResult<()> {
        if self.meta.pipelining == Support::Supported {
            self.send(Command::MailFrom(&mail.from))?;
            self.send(Command::RcptTo(&mail.to))?;
            self.send(Command::Data)?;
            self.reply_mail_from(&mail.from)?;
            self.reply_rcpt_to(&mail.to)?;
            self.reply_data()?;
        } else {
            self.send(Command::MailFrom(&mail.from))?;
            self.reply_mail_from(&mail.from)?;
            self.send(Command::RcptTo(&mail.to))?;
            self.reply_rcpt_to(&mail.to)?;
            self.send(Command::Data)?;
            self.reply_data()?;
        }
        self.payload(mail)
    }

    /// Drops the connection without saying goodbye.
    pub fn terminate(&mut self) {
        if self.open {
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
            self.tlscon.take();
            self.open = false;
        }
    }

    pub fn close(&mut self) -> SmtpResult<()> {
        if !self.open {
            return Ok(());
        }
        let result = self
            .send(Command::Quit)
            .and_then(|_| self.recv_line())
            .and_then(|line| line.expect(StatusCode::ServiceClosingChannel));
        self.terminate();
        result
    }
}

impl<L: Logger> Drop for MailerConnection<L> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::debug!("QUIT was not acknowledged: {err}");
        }
    }
}

fn unavailable(code: StatusCode) -> bool {
    code == StatusCode::ServiceNotAvailable || code == StatusCode::TransactionFailed
}

fn resolve(server: &Server) -> SmtpResult<SocketAddr> {
    let target = format!("{}:{}", server.address, server.port);
    target
        .to_socket_addrs()
        .map_err(|_| SmtpError::Dns(target.clone()))?
        .next()
        .ok_or(SmtpError::Dns(target))
}
