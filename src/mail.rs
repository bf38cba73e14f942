use mail_builder::MessageBuilder;

use crate::error::{SmtpError, SmtpResult};

/// A fully assembled outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub subject: String,
    pub from: String,
    pub from_name: Option<String>,
    pub to: String,
    pub to_name: Option<String>,
    pub text: String,
}

impl Mail {
    /// RFC 5322 bytes of the message.
    pub fn to_bytes(&self) -> SmtpResult<Vec<u8>> {
        MessageBuilder::new()
            .from((
                self.from_name.clone().unwrap_or_default(),
                self.from.clone(),
            ))
            .to((self.to_name.clone().unwrap_or_default(), self.to.clone()))
            .subject(self.subject.as_str())
            .text_body(self.text.as_str())
            .write_to_vec()
            .map_err(SmtpError::Build)
    }

    /// The message as sent after DATA: dot-stuffed and terminated.
    pub fn data(&self) -> SmtpResult<Vec<u8>> {
        Ok(dot_stuff(&self.to_bytes()?))
    }
}

fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(message.len() + 8);
    let mut line_start = true;
    for &byte in message {
        if line_start && byte == b'.' {
            data.push(b'.');
        }
        data.push(byte);
        line_start = byte == b'\n';
    }
    if !data.ends_with(b"\r\n") {
        data.extend_from_slice(b"\r\n");
    }
    data.extend_from_slice(b".\r\n");
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> Mail {
        Mail {
            subject: "Hello".to_string(),
            from: "me@example.com".to_string(),
            from_name: Some("Dora".to_string()),
            to: "al@x.com".to_string(),
            to_name: Some("Alice".to_string()),
            text: "Hi Alice,\r\n.\r\nbye".to_string(),
        }
    }

    #[test]
    fn leading_dots_are_doubled() {
        assert_eq!(
            dot_stuff(b".start\r\nmid.dle\r\n.\r\n"),
            b"..start\r\nmid.dle\r\n..\r\n.\r\n".to_vec()
        );
    }

    #[test]
    fn data_is_terminated() {
        let data = mail().data().unwrap();
        assert!(data.ends_with(b"\r\n.\r\n"));
        assert_eq!(dot_stuff(b"no newline"), b"no newline\r\n.\r\n".to_vec());
    }

    #[test]
    fn headers_carry_both_parties() {
        let bytes = String::from_utf8(mail().to_bytes().unwrap()).unwrap();
        assert!(bytes.contains("Subject: Hello"));
        assert!(bytes.contains("<me@example.com>"));
        assert!(bytes.contains("<al@x.com>"));
    }
}
