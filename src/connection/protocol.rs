use std::fmt;

use base64::{engine::general_purpose, Engine};

use crate::error::{SmtpError, SmtpResult};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StatusCode {
    SystemStatus = 211,
    HelpMessage = 214,
    ServiceReady = 220,
    ServiceClosingChannel = 221,
    AuthSuccess = 235,
    Okay = 250,
    UserNotLocal = 251,
    CannotVerifyWillAttempt = 252,
    ServerChallenge = 334,
    StartMailInput = 354,
    ServiceNotAvailable = 421,
    PasswordTransition = 432,
    MailboxUnavailable = 450,
    LocalError = 451,
    InsufficientStorage = 452,
    TempAuthFailure = 454,
    CannotAccommodateParams = 455,
    CommandUnrecognized = 500,
    SyntaxError = 501,
    CommandNotImplemented = 502,
    BadSequence = 503,
    ParamNotImplemented = 504,
    AuthRequired = 530,
    AuthMechWeak = 534,
    AuthInvalidCred = 535,
    AuthEncryptRequired = 538,
    NoAccess = 550,
    UserNotLocalError = 551,
    ExceededAllocation = 552,
    MailBoxNameNotAllowed = 553,
    TransactionFailed = 554,
    ParamsNotRecognized = 555,
}

impl TryFrom<u16> for StatusCode {
    type Error = SmtpError;

    fn try_from(code: u16) -> SmtpResult<StatusCode> {
        use StatusCode::*;
        Ok(match code {
            211 => SystemStatus,
            214 => HelpMessage,
            220 => ServiceReady,
            221 => ServiceClosingChannel,
            235 => AuthSuccess,
            250 => Okay,
            251 => UserNotLocal,
            252 => CannotVerifyWillAttempt,
            334 => ServerChallenge,
            354 => StartMailInput,
            421 => ServiceNotAvailable,
            432 => PasswordTransition,
            450 => MailboxUnavailable,
            451 => LocalError,
            452 => InsufficientStorage,
            454 => TempAuthFailure,
            455 => CannotAccommodateParams,
            500 => CommandUnrecognized,
            501 => SyntaxError,
            502 => CommandNotImplemented,
            503 => BadSequence,
            504 => ParamNotImplemented,
            530 => AuthRequired,
            534 => AuthMechWeak,
            535 => AuthInvalidCred,
            538 => AuthEncryptRequired,
            550 => NoAccess,
            551 => UserNotLocalError,
            552 => ExceededAllocation,
            553 => MailBoxNameNotAllowed,
            554 => TransactionFailed,
            555 => ParamsNotRecognized,
            _ => return Err(SmtpError::Protocol),
        })
    }
}

/// One line of a server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    code: StatusCode,
    text: String,
    last: bool,
}

impl Line {
    pub fn new(code: StatusCode, text: String, last: bool) -> Line {
        Line { code, text, last }
    }

    pub fn expect(&self, code: StatusCode) -> SmtpResult<()> {
        if self.code != code {
            Err(SmtpError::Protocol)
        } else {
            Ok(())
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn last(&self) -> bool {
        self.last
    }
}

/// Capabilities announced in an EHLO reply that the client cares about.
#[derive(Debug, PartialEq, Eq)]
pub enum EhloLine {
    Pipelining,
    StartTls,
    EightBitMime,
    Auth(Vec<AuthMech>),
    Other,
}

impl EhloLine {
    pub fn parse(text: &str) -> EhloLine {
        let mut words = text.split_ascii_whitespace();
        let keyword = words.next().unwrap_or_default().to_ascii_uppercase();
        match keyword.as_str() {
            "PIPELINING" => EhloLine::Pipelining,
            "STARTTLS" => EhloLine::StartTls,
            "8BITMIME" => EhloLine::EightBitMime,
            "AUTH" => EhloLine::Auth(words.filter_map(AuthMech::parse).collect()),
            _ => EhloLine::Other,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AuthMech {
    Plain,
    Login,
}

impl AuthMech {
    fn parse(word: &str) -> Option<AuthMech> {
        match word.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(AuthMech::Plain),
            "LOGIN" => Some(AuthMech::Login),
            _ => None,
        }
    }
}

pub enum Command<'a> {
    Ehlo(&'a str),
    Quit,
    StartTls,
    MailFrom(&'a str),
    RcptTo(&'a str),
    Data,
    AuthPlain(&'a str, &'a str),
    AuthLogin,
}

impl Command<'_> {
    /// What the transcript shows for this command; credentials are masked.
    pub fn transcript(&self) -> String {
        match self {
            Command::AuthPlain(..) => "AUTH PLAIN ********\r\n".to_string(),
            cmd => cmd.to_string(),
        }
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ehlo(me) => write!(f, "EHLO {me}"),
            Command::Quit => f.write_str("QUIT"),
            Command::StartTls => f.write_str("STARTTLS"),
            Command::MailFrom(from) => write!(f, "MAIL FROM:<{from}>"),
            Command::RcptTo(to) => write!(f, "RCPT TO:<{to}>"),
            Command::Data => f.write_str("DATA"),
            Command::AuthPlain(un, pw) => write!(f, "AUTH PLAIN {}", auth_plain_token(un, pw)),
            Command::AuthLogin => f.write_str("AUTH LOGIN"),
        }?;
        f.write_str("\r\n")
    }
}

pub fn auth_plain_token(username: &str, password: &str) -> String {
    let mut token = Vec::with_capacity(username.len() + password.len() + 2);
    token.push(0u8);
    token.extend_from_slice(username.as_bytes());
    token.push(0u8);
    token.extend_from_slice(password.as_bytes());
    general_purpose::STANDARD.encode(token)
}

pub fn auth_login_token(token: &str) -> String {
    general_purpose::STANDARD.encode(token)
}
