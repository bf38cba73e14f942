use std::{io, path::PathBuf};

use thiserror::Error;

use crate::dispatch::DispatchReport;

pub type Result<T> = std::result::Result<T, Error>;
pub type SmtpResult<T> = std::result::Result<T, SmtpError>;

#[derive(Debug, Error)]
pub enum Error {
    /// A configured file could not be opened or read.
    #[error("failed to read {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A recipient line without both a name and an email field.
    #[error("malformed recipient line {0:?}, expected name<TAB>email")]
    MalformedRecipient(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Smtp(#[from] SmtpError),

    #[error("failed to append to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install shutdown handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error(transparent)]
    Aborted(Box<Aborted>),
}

/// A batch that stopped on an unrecovered error, together with whatever it
/// had accomplished up to that point.
#[derive(Debug, Error)]
#[error("dispatch aborted after {} send attempts", .report.attempts)]
pub struct Aborted {
    pub report: DispatchReport,
    #[source]
    pub error: Error,
}

impl From<Aborted> for Error {
    fn from(aborted: Aborted) -> Self {
        Error::Aborted(Box::new(aborted))
    }
}

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("the mail server violated the protocol")]
    Protocol,
    #[error("can't reach the server")]
    ServerUnreachable,
    #[error("server abruptly ended the connection")]
    ServerUnavailable,
    #[error("the server address probably is not an SMTP one")]
    InvalidServer,
    #[error("network error: {0}")]
    Network(#[from] io::Error),
    #[error("failed to resolve hostname {0}")]
    Dns(String),
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("invalid server name for tls: {0}")]
    ServerName(String),
    #[error("credentials were rejected by the server")]
    InvalidCred,
    #[error("request rejected by server policy: {0}")]
    Policy(String),
    #[error("invalid email address <{0}>")]
    MailBoxName(String),
    #[error("address moved, server says: {0}")]
    Forward(String),
    #[error("failed to build message: {0}")]
    Build(io::Error),
    #[error("address pattern does not compile: {0}")]
    AddressPattern(regex::Error),
}
