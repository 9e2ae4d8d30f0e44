//! Bounded inbound channel backed by a local-socket listener.
//!
//! The listener runs on its own task and hands every accepted connection to
//! a reader task, so a sender that connects and stays silent never holds up
//! anyone else. Each connection delivers at most one frame. Frames enter a
//! bounded queue in completion order; when it is full, readers wait for a
//! free slot in arrival order. Dropping the [`Inbox`] (or calling
//! [`Inbox::close`]) destroys the named channel.

use std::time::Duration;

use futures_util::StreamExt;
use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use super::codec::FrameCodec;
use super::frame::Frame;
use crate::{AppError, Result};

/// How long a sender may hold a connection open before writing its frame.
const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Receiving end of a named channel.
#[derive(Debug)]
pub struct Inbox {
    name: String,
    rx: mpsc::Receiver<Frame>,
    ct: CancellationToken,
}

impl Inbox {
    /// Create the named channel and start accepting messages.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ChannelCreate` if the name is invalid or already
    /// bound by another listener.
    pub fn create(name: &str, depth: usize, max_frame_bytes: usize) -> Result<Self> {
        let listener_name = name.to_ns_name::<GenericNamespaced>().map_err(|err| {
            AppError::ChannelCreate(format!("invalid channel name '{name}': {err}"))
        })?;

        let listener = ListenerOptions::new()
            .name(listener_name)
            .create_tokio()
            .map_err(|err| {
                AppError::ChannelCreate(format!("failed to create channel '{name}': {err}"))
            })?;

        let (tx, rx) = mpsc::channel(depth.max(1));
        let ct = CancellationToken::new();

        let span = info_span!("inbox", channel = %name);
        tokio::spawn(accept_loop(listener, tx, ct.clone(), max_frame_bytes).instrument(span));

        debug!(channel = %name, depth, "channel created");

        Ok(Self {
            name: name.to_owned(),
            rx,
            ct,
        })
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next frame.
    ///
    /// Frames already queued are still returned after [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns `AppError::ChannelUnavailable` once the channel has been
    /// destroyed and drained.
    pub async fn receive(&mut self) -> Result<Frame> {
        self.rx.recv().await.ok_or_else(|| {
            AppError::ChannelUnavailable(format!("channel '{}' was destroyed", self.name))
        })
    }

    /// Destroy the named channel. New senders fail with `ChannelUnavailable`.
    pub fn close(&self) {
        self.ct.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.ct.is_cancelled()
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

async fn accept_loop(
    listener: LocalSocketListener,
    tx: mpsc::Sender<Frame>,
    ct: CancellationToken,
    max_frame_bytes: usize,
) {
    let readers = TaskTracker::new();

    loop {
        tokio::select! {
            () = ct.cancelled() => break,
            accept_result = listener.accept() => match accept_result {
                Ok(stream) => {
                    readers.spawn(
                        read_and_queue(stream, tx.clone(), ct.clone(), max_frame_bytes)
                            .in_current_span(),
                    );
                }
                Err(err) => warn!(%err, "channel accept failed"),
            },
        }
    }

    readers.close();
    info!(pending = readers.len(), "channel destroyed");
}

/// Read one connection's frame and queue it, unless the channel closes first.
async fn read_and_queue(
    stream: LocalSocketStream,
    tx: mpsc::Sender<Frame>,
    ct: CancellationToken,
    max_frame_bytes: usize,
) {
    let frame = tokio::select! {
        () = ct.cancelled() => return,
        frame = read_one(stream, max_frame_bytes) => frame,
    };
    let Some(frame) = frame else {
        return;
    };

    tokio::select! {
        () = ct.cancelled() => debug!("channel closed before frame was queued"),
        sent = tx.send(frame) => {
            if sent.is_err() {
                debug!("receiver dropped");
            }
        }
    }
}

/// Read the single frame carried by one connection.
async fn read_one(stream: LocalSocketStream, max_frame_bytes: usize) -> Option<Frame> {
    let mut framed = FramedRead::new(stream, FrameCodec::new(max_frame_bytes));

    match tokio::time::timeout(FRAME_READ_TIMEOUT, framed.next()).await {
        Ok(Some(Ok(frame))) => Some(frame),
        Ok(Some(Err(err))) => {
            warn!(%err, "discarding malformed frame");
            None
        }
        Ok(None) => {
            debug!("connection closed without a frame");
            None
        }
        Err(_) => {
            warn!("sender connected but wrote no frame in time");
            None
        }
    }
}
