//! Per-request command classification and response generation.
//!
//! Reserved keywords are matched exactly and case-sensitively; any other
//! text is handed to the [`Executor`]. Every path yields exactly one
//! response string no longer than the configured payload limit.

use std::sync::Arc;

use tracing::{info, warn};

use crate::exec::Executor;
use crate::models::client::ClientId;
use crate::models::request::Request;
use crate::registry::{Registry, VisibilityChange};

/// Keyword listing visible clients.
pub const LIST_CMD: &str = "LIST";
/// Keyword hiding the sender from listings.
pub const HIDE_CMD: &str = "HIDE";
/// Keyword making the sender visible again.
pub const UNHIDE_CMD: &str = "UNHIDE";

/// Reply to `LIST` when no client is visible.
pub const ALL_HIDDEN_MSG: &str = "[Server] All Clients Are Hidden...\n";
/// First line of a non-empty `LIST` reply.
pub const LIST_HEADER: &str = "[Server] Connected Clients:\n";
/// Reply to `HIDE` by an already hidden client.
pub const ALREADY_HIDDEN_MSG: &str = "[Server] You Are Already Hidden...\n";
/// Reply to a successful `HIDE`.
pub const NOW_HIDDEN_MSG: &str = "[Server] You Are Now Hidden...\n";
/// Reply to `UNHIDE` by a visible client.
pub const NOT_HIDDEN_MSG: &str = "[Server] You Are Not Hidden At All...\n";
/// Reply to a successful `UNHIDE`.
pub const NOW_VISIBLE_MSG: &str = "[Server] You Are Now Visible Again...\n";
/// Reply when an external command cannot be run.
pub const EXEC_FAILED_MSG: &str = "[Error] Failed to execute command.";

/// Classified command text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// List visible clients.
    List,
    /// Hide the sender.
    Hide,
    /// Unhide the sender.
    Unhide,
    /// Run through the external executor.
    External(&'a str),
}

impl<'a> Command<'a> {
    /// Classify `text` by exact match against the reserved keywords.
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        match text {
            LIST_CMD => Self::List,
            HIDE_CMD => Self::Hide,
            UNHIDE_CMD => Self::Unhide,
            other => Self::External(other),
        }
    }
}

/// Reply for `HIDE`/`UNHIDE` from an identity the registry does not track.
#[must_use]
pub fn not_registered_msg(id: ClientId) -> String {
    format!("[Error] Client {id} Is Not Registered...\n")
}

/// Reply for a command longer than the payload limit.
#[must_use]
pub fn too_long_msg(max_payload_bytes: usize) -> String {
    format!("[Error] Command exceeds {max_payload_bytes} bytes.")
}

/// Truncate `text` to at most `max_bytes`, backing off to a char boundary.
#[must_use]
pub fn truncate_to_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() > max_bytes {
        let mut end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Produces the response for one request.
pub struct Dispatcher {
    registry: Arc<Registry>,
    executor: Arc<dyn Executor>,
    max_payload_bytes: usize,
}

impl Dispatcher {
    /// Create a dispatcher whose responses never exceed `max_payload_bytes`.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        executor: Arc<dyn Executor>,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            registry,
            executor,
            max_payload_bytes,
        }
    }

    /// Registry consulted by control commands.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Build the response for `request`.
    pub async fn dispatch(&self, request: &Request) -> String {
        if request.command.len() > self.max_payload_bytes {
            warn!(bytes = request.command.len(), "command exceeds payload limit");
            return too_long_msg(self.max_payload_bytes);
        }

        let body = match Command::parse(&request.command) {
            Command::List => self.list().await,
            Command::Hide => {
                let change = self.registry.hide(request.client_id).await;
                visibility_reply(change, request.client_id, ALREADY_HIDDEN_MSG, NOW_HIDDEN_MSG)
            }
            Command::Unhide => {
                let change = self.registry.unhide(request.client_id).await;
                visibility_reply(change, request.client_id, NOT_HIDDEN_MSG, NOW_VISIBLE_MSG)
            }
            Command::External(command) => self.external(command).await,
        };

        truncate_to_boundary(body, self.max_payload_bytes)
    }

    async fn list(&self) -> String {
        let visible = self.registry.list_visible().await;
        if visible.is_empty() {
            return ALL_HIDDEN_MSG.to_owned();
        }

        let mut body = String::from(LIST_HEADER);
        for id in visible {
            body.push_str(&format!("Client PID: {id}\n"));
        }
        body
    }

    async fn external(&self, command: &str) -> String {
        match self.executor.execute(command, self.max_payload_bytes).await {
            Ok(output) => String::from_utf8_lossy(&output).into_owned(),
            Err(err) => {
                warn!(%err, "external command failed");
                EXEC_FAILED_MSG.to_owned()
            }
        }
    }
}

fn visibility_reply(
    change: VisibilityChange,
    id: ClientId,
    unchanged: &str,
    changed: &str,
) -> String {
    match change {
        VisibilityChange::Changed => {
            info!(client_id = %id, reply = changed.trim_end(), "visibility changed");
            changed.to_owned()
        }
        VisibilityChange::Unchanged => unchanged.to_owned(),
        VisibilityChange::NotRegistered => {
            warn!(client_id = %id, "visibility change for unregistered client");
            not_registered_msg(id)
        }
    }
}
