//! Broker configuration parsing and validation.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a working configuration. Clients and the broker must agree on
//! `name` and `max_message_size`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Smallest accepted `max_message_size`; the fixed server replies must fit.
pub const MIN_MESSAGE_SIZE: usize = 64;

fn default_name() -> String {
    "cmd-broker".into()
}

fn default_capacity() -> usize {
    10
}

fn default_queue_depth() -> usize {
    10
}

fn default_max_message_size() -> usize {
    1024
}

fn default_shell() -> String {
    "sh".into()
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

/// Broker and client configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BrokerConfig {
    /// Channel name prefix; the request channel uses it verbatim.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum number of tracked clients.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Bounded depth of every inbound channel, in messages.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Maximum message size in bytes, including the terminator.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Shell used to run external commands (`{shell} -c {command}`).
    #[serde(default = "default_shell")]
    pub shell: String,
    /// External command timeout; 0 means no timeout.
    #[serde(default)]
    pub exec_timeout_seconds: u64,
    /// How long shutdown waits for in-flight workers.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
            queue_depth: default_queue_depth(),
            max_message_size: default_max_message_size(),
            shell: default_shell(),
            exec_timeout_seconds: 0,
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl BrokerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Largest command or response payload, in bytes, excluding the terminator.
    #[must_use]
    pub fn max_payload_bytes(&self) -> usize {
        self.max_message_size.saturating_sub(1)
    }

    /// Line limit for the wire codec.
    ///
    /// JSON escaping may expand each payload byte to six (`\u00XX`), plus
    /// room for the frame envelope.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_message_size.saturating_mul(6).saturating_add(128)
    }

    /// External command timeout, if one is configured.
    #[must_use]
    pub fn exec_timeout(&self) -> Option<Duration> {
        (self.exec_timeout_seconds > 0).then_some(Duration::from_secs(self.exec_timeout_seconds))
    }

    /// Grace period granted to in-flight workers on shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Validate field ranges.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Config("name must not be empty".into()));
        }

        if self.capacity == 0 {
            return Err(AppError::Config(
                "capacity must be greater than zero".into(),
            ));
        }

        if self.queue_depth == 0 {
            return Err(AppError::Config(
                "queue_depth must be greater than zero".into(),
            ));
        }

        if self.max_message_size < MIN_MESSAGE_SIZE {
            return Err(AppError::Config(format!(
                "max_message_size must be at least {MIN_MESSAGE_SIZE} bytes"
            )));
        }

        if self.shell.trim().is_empty() {
            return Err(AppError::Config("shell must not be empty".into()));
        }

        Ok(())
    }
}
