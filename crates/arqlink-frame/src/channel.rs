//! Channel-layer message tags.
//!
//! Every frame carries one of these alongside its ARQ tag. Data travels as
//! [`ChannelMessage::NoOp`]; the others drive connection management.

/// Link-wide default for the number of channel ids.
pub const DEFAULT_MAX_CHANNELS: u8 = 8;

/// Channel-layer meaning of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMessage {
    /// Plain payload (possibly empty).
    NoOp,
    /// Request to open the channel, also its acknowledgment.
    Connect,
    /// Request to close the channel, also its acknowledgment.
    Disconnect,
    /// Reset the whole link.
    Reset,
}

impl ChannelMessage {
    /// Wire code (two bits).
    pub const fn code(self) -> u8 {
        match self {
            ChannelMessage::NoOp => 0,
            ChannelMessage::Connect => 1,
            ChannelMessage::Disconnect => 2,
            ChannelMessage::Reset => 3,
        }
    }

    /// Parse a two-bit wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ChannelMessage::NoOp),
            1 => Some(ChannelMessage::Connect),
            2 => Some(ChannelMessage::Disconnect),
            3 => Some(ChannelMessage::Reset),
            _ => None,
        }
    }

    /// Returns a human-readable name for the tag.
    pub fn name(self) -> &'static str {
        match self {
            ChannelMessage::NoOp => "NOOP",
            ChannelMessage::Connect => "CONNECT",
            ChannelMessage::Disconnect => "DISCONNECT",
            ChannelMessage::Reset => "RESET",
        }
    }
}
