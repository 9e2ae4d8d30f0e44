//! Named, message-oriented channels over local sockets.
//!
//! Each channel is a named pipe (Windows) or Unix domain socket
//! (Linux/macOS) created with the `interprocess` crate. A message is one
//! NDJSON [`Frame`] written on its own connection, so every `send` is
//! received whole by exactly one `receive`. Inbound channels queue frames in
//! a bounded FIFO ([`Inbox`]).
//!
//! Channel names are derived from a shared prefix so any party can address
//! any other without a directory lookup:
//!
//! | channel            | name                     | direction          |
//! |--------------------|--------------------------|--------------------|
//! | requests           | `{prefix}`               | clients → broker   |
//! | shutdown events    | `{prefix}-events`        | broker → clients   |
//! | replies for client | `{prefix}-client-{id}`   | broker → one client|

pub mod codec;
pub mod frame;
pub mod inbox;

use bytes::BytesMut;
use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Encoder;

use crate::models::client::ClientId;
use crate::{AppError, Result};

pub use codec::FrameCodec;
pub use frame::{Frame, SHUTDOWN_SENTINEL};
pub use inbox::Inbox;

/// Name of the well-known request channel.
#[must_use]
pub fn request_channel(prefix: &str) -> String {
    prefix.to_owned()
}

/// Name of the shutdown broadcast channel.
#[must_use]
pub fn events_channel(prefix: &str) -> String {
    format!("{prefix}-events")
}

/// Name of a client's private reply channel.
#[must_use]
pub fn reply_channel(prefix: &str, client_id: ClientId) -> String {
    format!("{prefix}-client-{client_id}")
}

/// Connect to a named channel.
///
/// # Errors
///
/// Returns `AppError::ChannelUnavailable` if the name is invalid or nothing
/// is listening on it.
pub async fn connect(channel: &str) -> Result<LocalSocketStream> {
    let name = channel.to_ns_name::<GenericNamespaced>().map_err(|err| {
        AppError::ChannelUnavailable(format!("invalid channel name '{channel}': {err}"))
    })?;

    LocalSocketStream::connect(name).await.map_err(|err| {
        AppError::ChannelUnavailable(format!("channel '{channel}' is not reachable: {err}"))
    })
}

/// Send one frame on a named channel.
///
/// # Errors
///
/// Returns `AppError::Protocol` if the encoded frame exceeds
/// `max_frame_bytes`, `AppError::ChannelUnavailable` if the channel does not
/// exist, and `AppError::DeliveryFailed` if the write fails.
pub async fn send(channel: &str, frame: &Frame, max_frame_bytes: usize) -> Result<()> {
    let mut buf = BytesMut::new();
    FrameCodec::new(max_frame_bytes).encode(frame, &mut buf)?;

    let mut stream = connect(channel).await?;
    stream
        .write_all(&buf)
        .await
        .map_err(|err| AppError::DeliveryFailed(format!("write to '{channel}' failed: {err}")))?;
    stream
        .flush()
        .await
        .map_err(|err| AppError::DeliveryFailed(format!("flush to '{channel}' failed: {err}")))?;

    Ok(())
}
