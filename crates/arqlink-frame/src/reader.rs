use bytes::BytesMut;
use tracing::trace;

use crate::armor::dearmor;
use crate::codec::{decode_frame, Frame};
use crate::error::Result;
use crate::writer::{EOM, MAX_ENCODED_LEN, SOM};

/// Outcome of feeding one byte to a [`FrameAccumulator`].
#[derive(Debug)]
pub enum Accumulated {
    /// Need more bytes.
    Pending,
    /// A complete, delimited message was decoded.
    Frame(Result<Frame>),
    /// The message grew past the maximum size and was dropped.
    Overflow,
}

/// Collects wire bytes into frames.
///
/// A SOM byte always starts a fresh message, so a truncated frame never poisons
/// the next one. Bytes outside a message and carriage returns are ignored.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: BytesMut,
    in_message: bool,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_ENCODED_LEN),
            in_message: false,
        }
    }

    /// Feed one received byte.
    pub fn push(&mut self, byte: u8) -> Accumulated {
        match byte {
            SOM => {
                if self.in_message && !self.buf.is_empty() {
                    trace!(discarded = self.buf.len(), "resync on start-of-message");
                }
                self.buf.clear();
                self.in_message = true;
                Accumulated::Pending
            }
            EOM if self.in_message => {
                self.in_message = false;
                let decoded = dearmor(&self.buf).and_then(|raw| decode_frame(&raw));
                self.buf.clear();
                Accumulated::Frame(decoded)
            }
            b'\r' => Accumulated::Pending,
            _ if !self.in_message => Accumulated::Pending,
            _ => {
                if self.buf.len() == MAX_ENCODED_LEN {
                    self.buf.clear();
                    self.in_message = false;
                    return Accumulated::Overflow;
                }
                self.buf.extend_from_slice(&[byte]);
                Accumulated::Pending
            }
        }
    }

    /// Drop any partial message.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.in_message = false;
    }

    /// Bytes collected for the current message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
