//! Wire frames exchanged on broker channels.
//!
//! One JSON object per line, tagged by `type`:
//!
//! ```json
//! {"type": "request", "client_id": 4242, "command": "ls -l"}
//! {"type": "response", "body": "total 0\n"}
//! {"type": "shutdown", "sentinel": "SHUTDOWN"}
//! ```

use serde::{Deserialize, Serialize};

use crate::models::client::ClientId;
use crate::models::request::Request;
use crate::Result;

/// Literal carried by the shutdown frame.
pub const SHUTDOWN_SENTINEL: &str = "SHUTDOWN";

/// A single message on a broker channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client command, sent on the well-known request channel.
    Request {
        /// Sender identity.
        client_id: ClientId,
        /// Command text.
        command: String,
    },
    /// Broker reply, sent on the requesting client's private channel.
    Response {
        /// Free-form reply text.
        body: String,
    },
    /// Shutdown broadcast, sent only on the events channel.
    Shutdown {
        /// Always [`SHUTDOWN_SENTINEL`].
        sentinel: String,
    },
}

impl Frame {
    /// Response frame carrying `body`.
    #[must_use]
    pub fn response(body: impl Into<String>) -> Self {
        Self::Response { body: body.into() }
    }

    /// The shutdown sentinel frame.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::Shutdown {
            sentinel: SHUTDOWN_SENTINEL.to_owned(),
        }
    }

    /// Whether this is a well-formed shutdown sentinel.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown { sentinel } if sentinel == SHUTDOWN_SENTINEL)
    }

    /// Serialize to a single JSON line without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the line is not a valid frame.
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

impl From<Request> for Frame {
    fn from(request: Request) -> Self {
        Self::Request {
            client_id: request.client_id,
            command: request.command,
        }
    }
}
