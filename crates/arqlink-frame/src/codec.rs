use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_16_IBM_3740};

use crate::arq::{ArqMessage, Seq};
use crate::channel::ChannelMessage;
use crate::error::{FrameError, Result};

/// Raw header: channel (1) + tags (1) + checksum (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Maximum raw payload per frame.
pub const MAX_PAYLOAD: usize = 32;

/// Largest raw frame.
pub const MAX_RAW_LEN: usize = HEADER_SIZE + MAX_PAYLOAD;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// One link-layer frame with a fixed-capacity payload.
#[derive(Clone)]
pub struct Frame {
    /// The channel this frame belongs to.
    pub channel: u8,
    /// Channel-layer tag.
    pub message: ChannelMessage,
    /// ARQ tag.
    pub arq: ArqMessage,
    len: usize,
    payload: [u8; MAX_PAYLOAD],
}

impl Frame {
    /// Create an empty frame.
    pub fn new(channel: u8, message: ChannelMessage, arq: ArqMessage) -> Self {
        Self {
            channel,
            message,
            arq,
            len: 0,
            payload: [0; MAX_PAYLOAD],
        }
    }

    /// Create a frame carrying `payload`.
    pub fn with_payload(
        channel: u8,
        message: ChannelMessage,
        arq: ArqMessage,
        payload: &[u8],
    ) -> Result<Self> {
        let mut frame = Self::new(channel, message, arq);
        frame.set_payload(payload)?;
        Ok(frame)
    }

    /// An acknowledgment frame.
    pub fn ack(seq: Seq) -> Self {
        Self::new(0, ChannelMessage::NoOp, ArqMessage::Ack(seq))
    }

    /// A link reset request.
    pub fn reset() -> Self {
        Self::new(0, ChannelMessage::Reset, ArqMessage::Data(Seq::Zero))
    }

    /// Answer to a reset request: the sender has reset too.
    pub fn reset_ack() -> Self {
        Self::new(0, ChannelMessage::Reset, ArqMessage::Ack(Seq::Zero))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == MAX_PAYLOAD
    }

    /// Append one payload byte. Returns `false` when the frame is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.payload[self.len] = byte;
        self.len += 1;
        true
    }

    /// Replace the payload.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        self.payload[..payload.len()].copy_from_slice(payload);
        self.len = payload.len();
        Ok(())
    }

    /// Reset to an empty NoOp/DATA0 frame on channel 0.
    pub fn clear(&mut self) {
        self.channel = 0;
        self.message = ChannelMessage::NoOp;
        self.arq = ArqMessage::Data(Seq::Zero);
        self.len = 0;
    }

    /// Checksum over channel, tags and payload.
    pub fn checksum(&self) -> u16 {
        let mut digest = CRC16.digest();
        digest.update(&[self.channel, self.tag_byte()]);
        digest.update(self.payload());
        digest.finalize()
    }

    /// The raw size of this frame (header + payload).
    pub fn raw_size(&self) -> usize {
        HEADER_SIZE + self.len
    }

    fn tag_byte(&self) -> u8 {
        (self.message.code() << 2) | self.arq.code()
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.channel == other.channel
            && self.message == other.message
            && self.arq == other.arq
            && self.payload() == other.payload()
    }
}

impl Eq for Frame {}

impl Default for Frame {
    fn default() -> Self {
        Self::new(0, ChannelMessage::NoOp, ArqMessage::Data(Seq::Zero))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("channel", &self.channel)
            .field("message", &self.message)
            .field("arq", &self.arq)
            .field("payload", &self.payload())
            .finish()
    }
}

/// Encode a frame into its raw (unarmored) layout.
///
/// ```text
/// ┌──────────┬──────────────────────┬────────────┬──────────────┐
/// │ Channel  │ Tags                 │ CRC-16     │ Payload      │
/// │ (1B)     │ (msg << 2) | arq     │ (2B BE)    │ (0..=32B)    │
/// └──────────┴──────────────────────┴────────────┴──────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.raw_size());
    dst.put_u8(frame.channel);
    dst.put_u8(frame.tag_byte());
    dst.put_u16(frame.checksum());
    dst.put_slice(frame.payload());
}

/// Decode and verify a raw frame.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::FrameTooShort {
            len: src.len(),
            min: HEADER_SIZE,
        });
    }

    let tags = src[1];
    if tags & 0xF0 != 0 {
        return Err(FrameError::InvalidTag(tags));
    }
    let message = ChannelMessage::from_code(tags >> 2).ok_or(FrameError::InvalidTag(tags))?;
    let arq = ArqMessage::from_code(tags & 0x03).ok_or(FrameError::InvalidTag(tags))?;
    let received = u16::from_be_bytes([src[2], src[3]]);

    let frame = Frame::with_payload(src[0], message, arq, &src[HEADER_SIZE..])?;
    let computed = frame.checksum();
    if computed != received {
        return Err(FrameError::ChecksumMismatch { received, computed });
    }

    Ok(frame)
}
