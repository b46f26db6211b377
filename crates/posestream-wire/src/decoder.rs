//! Stream reassembly
//!
//! TCP delivers bytes, not frames. `FrameDecoder` buffers whatever the
//! transport hands over and yields frames once they are complete.

use bytes::BytesMut;

use posestream_core::{PoseError, PoseResult};

use crate::frame::{decode_frame, read_length_prefix, StreamFrame, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Read target for `AsyncReadExt::read_buf`
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes held that do not yet form a complete frame
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame
    ///
    /// `Ok(None)` means more bytes are needed. An error leaves the stream
    /// unusable; the caller should drop the connection.
    pub fn next_frame(&mut self) -> PoseResult<Option<StreamFrame>> {
        if self.buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let body_len = read_length_prefix(&self.buf);
        if body_len > MAX_FRAME_SIZE {
            return Err(PoseError::FrameTooLarge {
                size: body_len,
                max: MAX_FRAME_SIZE,
            });
        }

        let total = LENGTH_PREFIX_SIZE + body_len;
        if self.buf.len() < total {
            self.buf.reserve(total - self.buf.len());
            return Ok(None);
        }

        let raw = self.buf.split_to(total);
        decode_frame(&raw).map(Some)
    }

    /// Drain every complete frame and keep only the newest
    pub fn latest_frame(&mut self) -> PoseResult<Option<StreamFrame>> {
        let mut latest = None;
        while let Some(frame) = self.next_frame()? {
            latest = Some(frame);
        }
        Ok(latest)
    }
}
