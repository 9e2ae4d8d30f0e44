//! Broker receive loop, worker spawning, and shutdown sequencing.
//!
//! ## Lifecycle
//!
//! ```text
//! Listening ──request──▶ Dispatching(n) ──workers retire──▶ Listening
//!     │                        │
//!     └──────── shutdown ──────┴──▶ ShuttingDown
//! ```
//!
//! The loop registers each sender, spawns one tracked worker per request,
//! and goes straight back to receiving. Workers run the [`Dispatcher`] and
//! send exactly one response to the requester's private channel.

pub mod shutdown;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::BrokerConfig;
use crate::dispatch::Dispatcher;
use crate::exec::Executor;
use crate::ipc::{self, Frame, Inbox};
use crate::models::request::Request;
use crate::registry::{RegisterOutcome, Registry};
use crate::Result;

use self::shutdown::ShutdownBroadcaster;

/// Observable broker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    /// Waiting for requests; no workers outstanding.
    Listening,
    /// Waiting for requests while `n` workers are outstanding.
    Dispatching(usize),
    /// Shutdown triggered; no further requests are accepted.
    ShuttingDown,
}

/// Cloneable control surface for a running broker.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    shutdown: CancellationToken,
    workers: TaskTracker,
    registry: Arc<Registry>,
    subscribers: Arc<AtomicUsize>,
}

impl BrokerHandle {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BrokerState {
        if self.shutdown.is_cancelled() {
            return BrokerState::ShuttingDown;
        }
        match self.workers.len() {
            0 => BrokerState::Listening,
            n => BrokerState::Dispatching(n),
        }
    }

    /// Trigger shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Registry shared with the workers.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Number of clients subscribed to the shutdown broadcast.
    #[must_use]
    pub fn subscribers(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

/// The command broker.
pub struct Broker {
    config: Arc<BrokerConfig>,
    dispatcher: Arc<Dispatcher>,
    requests: Inbox,
    events: ShutdownBroadcaster,
    handle: BrokerHandle,
}

impl Broker {
    /// Create the request and events channels.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ChannelCreate` if either channel cannot be created.
    pub fn start(config: Arc<BrokerConfig>, executor: Arc<dyn Executor>) -> Result<Self> {
        let registry = Arc::new(Registry::new(config.capacity));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            executor,
            config.max_payload_bytes(),
        ));

        let requests = Inbox::create(
            &ipc::request_channel(&config.name),
            config.queue_depth,
            config.max_frame_bytes(),
        )?;
        let events = ShutdownBroadcaster::create(
            &ipc::events_channel(&config.name),
            config.max_frame_bytes(),
        )?;

        info!(
            channel = %requests.name(),
            events = %events.name(),
            capacity = config.capacity,
            "listening for client commands"
        );

        let handle = BrokerHandle {
            shutdown: CancellationToken::new(),
            workers: TaskTracker::new(),
            registry,
            subscribers: events.subscriber_counter(),
        };

        Ok(Self {
            config,
            dispatcher,
            requests,
            events,
            handle,
        })
    }

    /// Control handle usable from other tasks.
    #[must_use]
    pub fn handle(&self) -> BrokerHandle {
        self.handle.clone()
    }

    /// Run the receive loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ChannelUnavailable` if the request channel is
    /// destroyed underneath the loop.
    pub async fn serve(mut self) -> Result<()> {
        let span = info_span!("broker", name = %self.config.name);
        async move {
            loop {
                let received = tokio::select! {
                    () = self.handle.shutdown.cancelled() => break,
                    received = self.requests.receive() => received,
                };

                match received {
                    Ok(frame) => self.accept(frame).await,
                    Err(err) => {
                        error!(%err, "request channel failed; broker terminating");
                        self.handle.workers.close();
                        return Err(err);
                    }
                }
            }

            self.shutdown().await;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn accept(&self, frame: Frame) {
        let (client_id, command) = match frame {
            Frame::Request { client_id, command } => (client_id, command),
            other => {
                warn!(frame = ?other, "discarding non-request frame on request channel");
                return;
            }
        };

        match self.handle.registry.register_if_new(client_id).await {
            RegisterOutcome::Registered => info!(%client_id, "client registered"),
            RegisterOutcome::AlreadyKnown => {}
            RegisterOutcome::CapacityReached => {
                debug!(%client_id, "registry full; client not tracked");
            }
        }

        let request = Request::new(client_id, command);
        let dispatcher = Arc::clone(&self.dispatcher);
        let reply_to = ipc::reply_channel(&self.config.name, client_id);
        let max_frame_bytes = self.config.max_frame_bytes();
        let span = info_span!("worker", %client_id);

        self.handle
            .workers
            .spawn(run_worker(dispatcher, request, reply_to, max_frame_bytes).instrument(span));
    }

    async fn shutdown(&self) {
        info!("shutting down");
        let grace = self.config.shutdown_grace();

        self.requests.close();
        self.events.broadcast(grace).await;

        let workers = &self.handle.workers;
        workers.close();
        if tokio::time::timeout(grace, workers.wait()).await.is_err() {
            warn!(
                outstanding = workers.len(),
                "abandoning workers still running after grace period"
            );
        }

        info!("broker stopped");
    }
}

async fn run_worker(
    dispatcher: Arc<Dispatcher>,
    request: Request,
    reply_to: String,
    max_frame_bytes: usize,
) {
    info!(command = %request.command, "received command");

    let body = dispatcher.dispatch(&request).await;
    match ipc::send(&reply_to, &Frame::response(body), max_frame_bytes).await {
        Ok(()) => debug!("response delivered"),
        Err(err) => warn!(%err, "failed to deliver response"),
    }
}
