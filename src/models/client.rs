//! Client identity and registry record.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque client identity: the client's operating-system process id.
///
/// Assigned by the environment, never by the broker. Rendered in decimal,
/// which is also how it appears in the client's reply channel name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Identity of the calling process.
    #[must_use]
    pub fn current() -> Self {
        Self(std::process::id())
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client known to the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientRecord {
    /// Client identity; unique within the registry.
    pub id: ClientId,
    /// Whether the client is excluded from `LIST` output.
    pub hidden: bool,
    /// When the broker first saw a request from this client.
    pub first_seen: DateTime<Utc>,
}

impl ClientRecord {
    /// Construct a visible record first seen now.
    #[must_use]
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            hidden: false,
            first_seen: Utc::now(),
        }
    }
}
