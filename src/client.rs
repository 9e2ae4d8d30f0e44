//! Client-side agent.
//!
//! A [`Client`] owns its private reply channel for its whole lifetime and
//! submits one request at a time, blocking for the correlated reply. The
//! shutdown listener is independent: [`subscribe_shutdown`] opens the
//! broker's events channel and [`ShutdownWatch::wait`] resolves when the
//! sentinel arrives.

use futures_util::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::warn;

use crate::config::BrokerConfig;
use crate::ipc::{self, Frame, FrameCodec, Inbox};
use crate::models::client::ClientId;
use crate::models::request::Request;
use crate::{AppError, Result};

/// Local command that ends the interactive client without contacting the broker.
pub const EXIT_CMD: &str = "exit";

/// Why a [`ShutdownWatch`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The broker broadcast the shutdown sentinel.
    Sentinel,
    /// The events channel closed without a sentinel.
    BrokerGone,
}

/// A connected client.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    request_channel: String,
    max_payload_bytes: usize,
    max_frame_bytes: usize,
    replies: Inbox,
}

impl Client {
    /// Create the private reply channel for `id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ChannelCreate` if the reply channel cannot be
    /// created, for example because another live client uses the same id.
    pub fn connect(config: &BrokerConfig, id: ClientId) -> Result<Self> {
        let replies = Inbox::create(
            &ipc::reply_channel(&config.name, id),
            config.queue_depth,
            config.max_frame_bytes(),
        )?;

        Ok(Self {
            id,
            request_channel: ipc::request_channel(&config.name),
            max_payload_bytes: config.max_payload_bytes(),
            max_frame_bytes: config.max_frame_bytes(),
            replies,
        })
    }

    /// Submit `command` and wait for its response.
    ///
    /// There is no timeout: if the broker drops the request the call waits
    /// until the reply channel is destroyed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if `command` exceeds the payload limit,
    /// or any transport error from sending the request or receiving the reply.
    pub async fn submit(&mut self, command: &str) -> Result<String> {
        if command.len() > self.max_payload_bytes {
            return Err(AppError::Protocol(format!(
                "command is {} bytes; limit is {}",
                command.len(),
                self.max_payload_bytes
            )));
        }

        let request = Frame::from(Request::new(self.id, command));
        ipc::send(&self.request_channel, &request, self.max_frame_bytes).await?;

        loop {
            match self.replies.receive().await? {
                Frame::Response { body } => return Ok(body),
                other => warn!(frame = ?other, "ignoring unexpected frame on reply channel"),
            }
        }
    }
}

/// Subscription to the broker's shutdown broadcast.
pub struct ShutdownWatch {
    framed: FramedRead<interprocess::local_socket::tokio::Stream, FrameCodec>,
}

/// Subscribe to the shutdown broadcast of the broker named by `config`.
///
/// # Errors
///
/// Returns `AppError::ChannelUnavailable` if the broker is not running.
pub async fn subscribe_shutdown(config: &BrokerConfig) -> Result<ShutdownWatch> {
    let stream = ipc::connect(&ipc::events_channel(&config.name)).await?;
    Ok(ShutdownWatch {
        framed: FramedRead::new(stream, FrameCodec::new(config.max_frame_bytes())),
    })
}

impl ShutdownWatch {
    /// Wait until the broker shuts down.
    pub async fn wait(mut self) -> ShutdownReason {
        while let Some(next) = self.framed.next().await {
            match next {
                Ok(frame) if frame.is_shutdown() => return ShutdownReason::Sentinel,
                Ok(frame) => warn!(?frame, "ignoring unexpected frame on events channel"),
                Err(err) => {
                    warn!(%err, "events channel read failed");
                    break;
                }
            }
        }
        ShutdownReason::BrokerGone
    }
}
