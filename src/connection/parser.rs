use std::io::Read;

use super::protocol::{Line, StatusCode};
use crate::{
    error::{SmtpError, SmtpResult},
    logger::Logger,
};

/// Longest reply line accepted before the server is deemed broken.
const MAX_LINE: usize = 4096;

pub(crate) struct Parser<'a, T, L>
where
    T: Read,
    L: Logger,
{
    stream: &'a mut T,
    logger: &'a mut L,
}

impl<'a, T, L> Parser<'a, T, L>
where
    T: Read,
    L: Logger,
{
    pub(crate) fn new(stream: &'a mut T, logger: &'a mut L) -> Parser<'a, T, L> {
        Parser { stream, logger }
    }

    /// Reads up to and including the next CRLF, one byte at a time so nothing
    /// past the reply is consumed from the stream.
    fn recv_raw(&mut self) -> SmtpResult<Vec<u8>> {
        let mut raw = Vec::with_capacity(128);
        let mut byte = [0u8; 1];
        while !raw.ends_with(b"\r\n") {
            if raw.len() >= MAX_LINE {
                return Err(SmtpError::Protocol);
            }
            if self.stream.read(&mut byte)? == 0 {
                return Err(SmtpError::ServerUnavailable);
            }
            raw.push(byte[0]);
        }
        self.logger.server(&raw);
        Ok(raw)
    }

    pub(crate) fn recv_line(&mut self) -> SmtpResult<Line> {
        let raw = self.recv_raw()?;
        let raw = &raw[..raw.len() - 2];
        if raw.len() < 3 || !raw[..3].iter().all(u8::is_ascii_digit) {
            return Err(SmtpError::Protocol);
        }
        let code = raw[..3]
            .iter()
            .fold(0u16, |code, digit| code * 10 + u16::from(digit - b'0'));
        let (last, text) = match raw.get(3) {
            None => (true, String::new()),
            Some(b' ') => (true, String::from_utf8_lossy(&raw[4..]).into_owned()),
            Some(b'-') => (false, String::from_utf8_lossy(&raw[4..]).into_owned()),
            Some(_) => return Err(SmtpError::Protocol),
        };
        Ok(Line::new(StatusCode::try_from(code)?, text, last))
    }

    pub(crate) fn recv_reply(&mut self) -> SmtpResult<Vec<Line>> {
        let mut lines = vec![self.recv_line()?];
        while !lines[lines.len() - 1].last() {
            lines.push(self.recv_line()?);
        }
        Ok(lines)
    }
}
