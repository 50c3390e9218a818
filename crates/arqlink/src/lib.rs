//! Reliable, multiplexed byte channels over a single serial line.
//!
//! arqlink connects two endpoints (say a microcontroller and a host) over an
//! unreliable byte stream: a stop-and-wait ARQ link for ordered,
//! exactly-once frame delivery, with independent virtual channels on top.
//!
//! # Crate Structure
//!
//! - [`transport`]: polled byte transports (in-memory, streams, Unix-socket serial lines)
//! - [`frame`]: checksummed frame codec and printable wire armor
//! - [`link`]: the ARQ engine and channel multiplexer (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use arqlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use arqlink_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use arqlink_link::*;
}
