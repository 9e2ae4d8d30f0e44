//! NDJSON frame codec for broker channels.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! misbehaving peer cannot make a channel allocate without bound. Each
//! newline-terminated UTF-8 line is one [`Frame`].

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use super::frame::Frame;
use crate::{AppError, Result};

/// Frame codec used with [`tokio_util::codec::FramedRead`].
///
/// Inbound lines longer than the configured limit return
/// `AppError::Protocol("line too long: …")`. Empty lines are skipped.
#[derive(Debug)]
pub struct FrameCodec {
    lines: LinesCodec,
    max_line_bytes: usize,
}

impl FrameCodec {
    /// Create a codec accepting lines of at most `max_line_bytes`.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_bytes),
            max_line_bytes,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            let line = self
                .lines
                .decode(src)
                .map_err(|err| map_codec_error(err, self.max_line_bytes))?;
            match line {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => return Frame::from_json(&line).map(Some),
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            let line = self
                .lines
                .decode_eof(src)
                .map_err(|err| map_codec_error(err, self.max_line_bytes))?;
            match line {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => return Frame::from_json(&line).map(Some),
                None => return Ok(None),
            }
        }
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = AppError;

    /// Encode `frame` as a `\n`-terminated JSON line.
    ///
    /// The line limit is enforced on encode as well, so a sender learns
    /// about an oversized frame before the receiver drops it.
    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        let line = frame.to_json()?;
        if line.len() > self.max_line_bytes {
            return Err(AppError::Protocol(format!(
                "frame too long: {} bytes exceeds {}",
                line.len(),
                self.max_line_bytes
            )));
        }
        self.lines
            .encode(line, dst)
            .map_err(|err| map_codec_error(err, self.max_line_bytes))
    }
}

fn map_codec_error(err: LinesCodecError, max_line_bytes: usize) -> AppError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {max_line_bytes} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
