use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use serde_derive::Deserialize;

use crate::{
    connection::{Config, Credentials, Server},
    error::{Error, Result},
};

/// What to send and to whom: `email.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct EmailFile {
    pub subject: String,
    pub sender_name: String,
    pub recipients_source: PathBuf,
    pub already_sent_source: PathBuf,
    pub bad_addresses_source: PathBuf,
    pub body_template: String,
    pub package_size: usize,
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Who sends it and through which server: `email_account.toml`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountFile {
    pub user: MailUser,
    pub server: MailServer,
    pub config: Option<MailConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailUser {
    pub address: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct MailServer {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub implicit_tls: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    pub timeout: Option<u64>,
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| Error::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(path, &text)
}

fn parse_toml<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
    toml::from_str(text).map_err(|source| Error::Config {
        path: path.to_path_buf(),
        source,
    })
}

impl EmailFile {
    pub fn load(path: &Path) -> Result<EmailFile> {
        read_toml(path)
    }

    /// Echoes the settings at startup.
    pub fn log(&self) {
        tracing::info!(
            subject = %self.subject,
            sender_name = %self.sender_name,
            recipients = %self.recipients_source.display(),
            already_sent = %self.already_sent_source.display(),
            bad_addresses = %self.bad_addresses_source.display(),
            template = %self.body_template,
            template_dir = %self.template_dir.display(),
            package_size = self.package_size,
            "email settings"
        );
    }
}

impl MailConfig {
    pub fn destruct(self) -> Config {
        let mut config = Config::new();
        if let Some(value) = self.timeout {
            config.timeout(value);
        }
        config
    }
}

impl MailServer {
    pub fn destruct(self) -> Server {
        Server::new(self.address, self.port, self.implicit_tls)
    }
}

impl AccountFile {
    pub fn load(path: &Path) -> Result<AccountFile> {
        read_toml(path)
    }

    pub fn log(&self) {
        tracing::info!(
            address = %self.user.address,
            username = %self.user.username,
            password = "********",
            server = %self.server.address,
            port = self.server.port,
            implicit_tls = self.server.implicit_tls,
            "account settings"
        );
    }

    /// Splits the file into the sender address and the pieces the SMTP
    /// transport is built from.
    pub fn destruct(mut self) -> (String, Server, Config, Credentials) {
        let config = self
            .config
            .take()
            .map(MailConfig::destruct)
            .unwrap_or_else(Config::new);
        let credentials = Credentials::new(self.user.username, self.user.password);
        (self.user.address, self.server.destruct(), config, credentials)
    }
}
