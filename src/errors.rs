//! Error types shared across the broker and client.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A named channel could not be created; fatal at startup.
    ChannelCreate(String),
    /// The named channel does not exist, or was destroyed while waiting.
    ChannelUnavailable(String),
    /// Lower-level transport failure while writing a message.
    DeliveryFailed(String),
    /// Malformed, oversized, or unexpected message.
    Protocol(String),
    /// External command could not be started or did not complete.
    Exec(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ChannelCreate(msg) => write!(f, "channel create: {msg}"),
            Self::ChannelUnavailable(msg) => write!(f, "channel unavailable: {msg}"),
            Self::DeliveryFailed(msg) => write!(f, "delivery failed: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Exec(msg) => write!(f, "exec: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid frame: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
