//! Polled byte transports for arqlink.
//!
//! The link layer never blocks on I/O. It asks a [`Transport`] whether a byte
//! is available, pulls bytes one at a time, and pushes whole encoded frames
//! out in one best-effort call. Provided implementations:
//! - [`MemoryTransport`] for tests and in-process simulation
//! - [`StreamTransport`] over any non-blocking `Read + Write` (serial ports, sockets)
//! - [`SerialSocket`], a Unix domain socket used as a virtual serial line (Unix only)
//!
//! This is the lowest layer of arqlink. Everything else builds on top of
//! the [`Transport`] trait provided here.

pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use stream::StreamTransport;
pub use traits::Transport;

#[cfg(unix)]
pub use uds::{SerialSocket, SocketTransport};
