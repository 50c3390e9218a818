//! Checksummed, printable-armored frames for byte-oriented serial links.
//!
//! Every frame carries:
//! - A channel id for multiplexing
//! - A channel-layer tag (NoOp, Connect, Disconnect, Reset)
//! - An ARQ tag (DATA0, ACK0, DATA1, ACK1)
//! - A CRC-16 over all of the above plus the payload
//!
//! On the wire a frame is base64-armored and delimited as `:<armor>\n`, so a
//! receiver can always resynchronize on the next `:`.

pub mod armor;
pub mod arq;
pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use armor::{armor, armored_len, dearmor};
pub use arq::{ArqMessage, Seq};
pub use channel::{ChannelMessage, DEFAULT_MAX_CHANNELS};
pub use codec::{decode_frame, encode_frame, Frame, HEADER_SIZE, MAX_PAYLOAD, MAX_RAW_LEN};
pub use error::{FrameError, Result};
pub use reader::{Accumulated, FrameAccumulator};
pub use writer::{encode_wire, wire_bytes, EOM, MAX_ENCODED_LEN, MAX_WIRE_LEN, SOM};
