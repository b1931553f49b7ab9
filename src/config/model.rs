//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a default so an empty or missing file still works.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::irc::client::ClientOptions;
use crate::irc::message::Prefix;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The server to connect to and the identity to register with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Local hostname carried in the client's identity.
    #[serde(default = "default_host")]
    pub hostname: String,
    /// Sent as PASS when non-empty.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
}

impl ServerConfig {
    /// `host:port`, suitable for dialing.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn identity(&self) -> Prefix {
        Prefix::new(&self.nickname, &self.hostname, &self.username)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            nickname: default_nickname(),
            realname: default_realname(),
            hostname: default_host(),
            password: String::new(),
            channels: default_channels(),
            quit_message: default_quit_message(),
        }
    }
}

/// Connection pipeline tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_queue_capacity")]
    pub inbound_capacity: usize,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

impl ClientConfig {
    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            queue_capacity: self.queue_capacity,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            inbound_capacity: default_queue_capacity(),
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

/// Transcript logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    6667
}
fn default_username() -> String {
    "botu".to_string()
}
fn default_nickname() -> String {
    "botn".to_string()
}
fn default_realname() -> String {
    "cool guy".to_string()
}
fn default_channels() -> Vec<String> {
    vec!["#general".to_string()]
}
fn default_quit_message() -> String {
    "Leaving".to_string()
}
fn default_queue_capacity() -> usize {
    crate::irc::client::QUEUE_CAPACITY
}
fn default_handshake_timeout() -> u64 {
    crate::irc::client::HANDSHAKE_TIMEOUT.as_secs()
}
fn default_log_dir() -> String {
    "~/.local/share/tirc/logs".to_string()
}
