/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Armored text length is not a multiple of four.
    #[error("invalid armored length {0} (must be a multiple of 4)")]
    InvalidLength(usize),

    /// Armored text contains characters outside the armor alphabet.
    #[error("invalid armor encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// Decoded frame is shorter than the fixed header.
    #[error("frame too short ({len} bytes, header is {min})")]
    FrameTooShort { len: usize, min: usize },

    /// The tag byte does not hold a known channel/ARQ tag pair.
    #[error("invalid tag byte 0x{0:02x}")]
    InvalidTag(u8),

    /// The payload exceeds the fixed maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The checksum carried by the frame does not match its contents.
    #[error("checksum mismatch (frame 0x{received:04x}, computed 0x{computed:04x})")]
    ChecksumMismatch { received: u16, computed: u16 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
