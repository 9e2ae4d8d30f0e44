//! Inbound command request.

use serde::{Deserialize, Serialize};

use super::client::ClientId;

/// A command submitted by one client, consumed by exactly one worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Request {
    /// Identity of the submitting client; also addresses its reply channel.
    pub client_id: ClientId,
    /// Raw command text, matched verbatim against the reserved keywords.
    pub command: String,
}

impl Request {
    /// Construct a request.
    #[must_use]
    pub fn new(client_id: ClientId, command: impl Into<String>) -> Self {
        Self {
            client_id,
            command: command.into(),
        }
    }
}
