use bytes::{BufMut, Bytes, BytesMut};

use crate::armor::{armor, armored_len};
use crate::codec::{encode_frame, Frame, MAX_RAW_LEN};

/// Start-of-message marker.
pub const SOM: u8 = b':';

/// End-of-message marker; never produced by the armor.
pub const EOM: u8 = b'\n';

/// Largest armored frame body between SOM and EOM.
pub const MAX_ENCODED_LEN: usize = armored_len(MAX_RAW_LEN);

/// Largest complete wire message including delimiters.
pub const MAX_WIRE_LEN: usize = MAX_ENCODED_LEN + 2;

/// Append `<SOM><armored frame><EOM>` to `dst`.
pub fn encode_wire(frame: &Frame, dst: &mut BytesMut) {
    let mut raw = BytesMut::with_capacity(frame.raw_size());
    encode_frame(frame, &mut raw);

    dst.reserve(armored_len(raw.len()) + 2);
    dst.put_u8(SOM);
    armor(&raw, dst);
    dst.put_u8(EOM);
}

/// Encode a frame into a standalone wire message.
///
/// The result is what the transmitter keeps for retransmission.
pub fn wire_bytes(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAX_WIRE_LEN);
    encode_wire(frame, &mut buf);
    buf.freeze()
}
