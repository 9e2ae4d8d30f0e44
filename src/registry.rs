//! Fixed-capacity registry of known clients.
//!
//! The registry is the only state shared between broker workers. Every
//! operation takes the single lock, does O(capacity) work, and releases it
//! before returning; no caller can hold the lock across a channel receive or
//! an external command.

use tokio::sync::Mutex;

use crate::models::client::{ClientId, ClientRecord};

/// Result of [`Registry::register_if_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new visible record was appended.
    Registered,
    /// The identity was already present; nothing changed.
    AlreadyKnown,
    /// The registry is full; the identity was silently not recorded.
    CapacityReached,
}

/// Result of [`Registry::hide`] and [`Registry::unhide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    /// The flag was flipped.
    Changed,
    /// The flag already had the requested value.
    Unchanged,
    /// No record exists for the identity.
    NotRegistered,
}

/// Ordered, duplicate-free table of client records.
#[derive(Debug)]
pub struct Registry {
    capacity: usize,
    clients: Mutex<Vec<ClientRecord>>,
}

impl Registry {
    /// Create an empty registry holding at most `capacity` clients.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clients: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Maximum number of records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of records.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Whether no client has registered yet.
    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Record `id` as a visible client unless it is known or the table is full.
    pub async fn register_if_new(&self, id: ClientId) -> RegisterOutcome {
        let mut clients = self.clients.lock().await;
        if clients.iter().any(|record| record.id == id) {
            RegisterOutcome::AlreadyKnown
        } else if clients.len() >= self.capacity {
            RegisterOutcome::CapacityReached
        } else {
            clients.push(ClientRecord::new(id));
            RegisterOutcome::Registered
        }
    }

    /// Identities of visible clients, in registration order.
    pub async fn list_visible(&self) -> Vec<ClientId> {
        self.clients
            .lock()
            .await
            .iter()
            .filter(|record| !record.hidden)
            .map(|record| record.id)
            .collect()
    }

    /// Exclude `id` from listings.
    pub async fn hide(&self, id: ClientId) -> VisibilityChange {
        self.set_hidden(id, true).await
    }

    /// Include `id` in listings again.
    pub async fn unhide(&self, id: ClientId) -> VisibilityChange {
        self.set_hidden(id, false).await
    }

    /// Copy of every record, in registration order.
    pub async fn snapshot(&self) -> Vec<ClientRecord> {
        self.clients.lock().await.clone()
    }

    async fn set_hidden(&self, id: ClientId, hidden: bool) -> VisibilityChange {
        let mut clients = self.clients.lock().await;
        match clients.iter_mut().find(|record| record.id == id) {
            None => VisibilityChange::NotRegistered,
            Some(record) if record.hidden == hidden => VisibilityChange::Unchanged,
            Some(record) => {
                record.hidden = hidden;
                VisibilityChange::Changed
            }
        }
    }
}
