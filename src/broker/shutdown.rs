//! Shutdown broadcast over the dedicated events channel.
//!
//! Clients subscribe by connecting to `{prefix}-events` and keeping the
//! connection open. The request channel never carries the sentinel, so the
//! broker's own receive loop cannot consume it by mistake.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::ipc::{Frame, FrameCodec};
use crate::{AppError, Result};

/// Sends the shutdown sentinel to every subscribed client.
#[derive(Debug)]
pub struct ShutdownBroadcaster {
    name: String,
    stop_accept: CancellationToken,
    signal: CancellationToken,
    subscribers: TaskTracker,
    live: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl ShutdownBroadcaster {
    /// Create the events channel and start accepting subscribers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ChannelCreate` if the channel cannot be bound.
    pub fn create(name: &str, max_frame_bytes: usize) -> Result<Self> {
        let mut buf = BytesMut::new();
        FrameCodec::new(max_frame_bytes).encode(&Frame::shutdown(), &mut buf)?;
        let sentinel = buf.freeze();

        let listener_name = name.to_ns_name::<GenericNamespaced>().map_err(|err| {
            AppError::ChannelCreate(format!("invalid channel name '{name}': {err}"))
        })?;
        let listener = ListenerOptions::new()
            .name(listener_name)
            .create_tokio()
            .map_err(|err| {
                AppError::ChannelCreate(format!("failed to create channel '{name}': {err}"))
            })?;

        let broadcaster = Self {
            name: name.to_owned(),
            stop_accept: CancellationToken::new(),
            signal: CancellationToken::new(),
            subscribers: TaskTracker::new(),
            live: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(AtomicUsize::new(0)),
        };

        let accept = AcceptContext {
            stop_accept: broadcaster.stop_accept.clone(),
            signal: broadcaster.signal.clone(),
            subscribers: broadcaster.subscribers.clone(),
            live: Arc::clone(&broadcaster.live),
            delivered: Arc::clone(&broadcaster.delivered),
            sentinel,
        };
        let span = info_span!("events", channel = %name);
        tokio::spawn(accept.run(listener).instrument(span));

        Ok(broadcaster)
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of clients currently subscribed.
    #[must_use]
    pub fn subscribers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Shared live-subscriber counter, for observers outliving `&self`.
    #[must_use]
    pub fn subscriber_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }

    /// Stop accepting subscribers, send the sentinel to each, and destroy
    /// the channel. Waits at most `grace` for the writes to finish.
    ///
    /// Returns the number of clients the sentinel was written to.
    pub async fn broadcast(&self, grace: Duration) -> usize {
        self.stop_accept.cancel();
        self.signal.cancel();
        self.subscribers.close();

        if tokio::time::timeout(grace, self.subscribers.wait())
            .await
            .is_err()
        {
            warn!(
                pending = self.subscribers.len(),
                "shutdown sentinel not delivered to every subscriber in time"
            );
        }

        let delivered = self.delivered.load(Ordering::SeqCst);
        info!(delivered, "shutdown sentinel broadcast");
        delivered
    }
}

impl Drop for ShutdownBroadcaster {
    fn drop(&mut self) {
        self.stop_accept.cancel();
    }
}

struct AcceptContext {
    stop_accept: CancellationToken,
    signal: CancellationToken,
    subscribers: TaskTracker,
    live: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
    sentinel: Bytes,
}

impl AcceptContext {
    async fn run(self, listener: LocalSocketListener) {
        loop {
            tokio::select! {
                () = self.stop_accept.cancelled() => {
                    debug!("events channel destroyed");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok(stream) => {
                            self.live.fetch_add(1, Ordering::SeqCst);
                            let subscriber = Subscriber {
                                signal: self.signal.clone(),
                                live: Arc::clone(&self.live),
                                delivered: Arc::clone(&self.delivered),
                                sentinel: self.sentinel.clone(),
                            };
                            self.subscribers
                                .spawn(subscriber.serve(stream).in_current_span());
                        }
                        Err(err) => {
                            warn!(%err, "events accept failed");
                        }
                    }
                }
            }
        }
    }
}

struct Subscriber {
    signal: CancellationToken,
    live: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
    sentinel: Bytes,
}

impl Subscriber {
    /// Hold the subscriber's connection until shutdown or until it leaves.
    async fn serve(self, stream: LocalSocketStream) {
        let (mut reader, mut writer) = stream.split();
        let mut probe = [0_u8; 64];

        loop {
            tokio::select! {
                () = self.signal.cancelled() => {
                    match deliver(&mut writer, &self.sentinel).await {
                        Ok(()) => {
                            self.delivered.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(err) => debug!(%err, "subscriber gone before sentinel"),
                    }
                    break;
                }
                read = reader.read(&mut probe) => {
                    match read {
                        Ok(0) => {
                            debug!("subscriber disconnected");
                            break;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            debug!(%err, "subscriber read failed");
                            break;
                        }
                    }
                }
            }
        }

        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn deliver<W>(writer: &mut W, sentinel: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(sentinel).await?;
    writer.flush().await
}
