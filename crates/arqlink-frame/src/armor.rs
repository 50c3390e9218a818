//! Printable armor: standard base64 with padding, 3 raw bytes to 4 characters.
//!
//! The alphabet is `A-Z a-z 0-9 + /` plus `=` padding, so the wire delimiters
//! (`:` and `\n`) can never appear inside an armored frame.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::BytesMut;

use crate::error::{FrameError, Result};

/// Armored size of `raw_len` raw bytes.
pub const fn armored_len(raw_len: usize) -> usize {
    raw_len.div_ceil(3) * 4
}

/// Whether `byte` belongs to the armor alphabet (padding included).
pub fn is_armor_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'/' | b'=')
}

/// Append the armored form of `raw` to `dst`.
pub fn armor(raw: &[u8], dst: &mut BytesMut) {
    let start = dst.len();
    dst.resize(start + armored_len(raw.len()), 0);
    let encoded = STANDARD.encode_slice(raw, &mut dst[start..]);
    debug_assert!(encoded.is_ok(), "armored_len undersized the output");
    dst.truncate(start + encoded.unwrap_or(0));
}

/// Decode armored text back to raw bytes.
pub fn dearmor(text: &[u8]) -> Result<Vec<u8>> {
    if text.len() % 4 != 0 {
        return Err(FrameError::InvalidLength(text.len()));
    }
    Ok(STANDARD.decode(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armored(raw: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        armor(raw, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn roundtrip_all_lengths() {
        let source: Vec<u8> = (0..=255u8).rev().collect();
        for len in 0..=40 {
            let raw = &source[..len];
            let text = armored(raw);
            assert_eq!(text.len(), armored_len(len));
            assert!(text.iter().all(|&b| is_armor_byte(b)));
            assert_eq!(dearmor(&text).unwrap(), raw);
        }
    }

    #[test]
    fn expansion_is_three_to_four() {
        assert_eq!(armored(b"abc"), b"YWJj");
        assert_eq!(armored(b"ab"), b"YWI=");
        assert_eq!(armored_len(36), 48);
    }

    #[test]
    fn rejects_bad_length() {
        assert!(matches!(dearmor(b"YWJ"), Err(FrameError::InvalidLength(3))));
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        assert!(matches!(
            dearmor(b"YW:j"),
            Err(FrameError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn armor_appends_after_existing_bytes() {
        let mut buf = BytesMut::from(&b":"[..]);
        armor(b"abcd", &mut buf);
        assert_eq!(&buf[..], b":YWJjZA==");
    }

    #[test]
    fn delimiters_are_not_armor_bytes() {
        assert!(!is_armor_byte(b':'));
        assert!(!is_armor_byte(b'\n'));
        assert!(!is_armor_byte(b'\r'));
    }
}
