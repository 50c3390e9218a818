//! Reliable, multiplexed delivery over a single serial byte stream.
//!
//! A [`Link`] runs a stop-and-wait ARQ protocol with alternating sequence
//! numbers over any [`Transport`](arqlink_transport::Transport), and carries
//! several independent [`Channel`]s with connect/disconnect semantics on top.
//!
//! At most one frame is unacknowledged at a time, and a received frame is only
//! acknowledged once the application has consumed it, so the sender can never
//! outrun the receiver's buffer pool.
//!
//! ```no_run
//! use std::time::{Duration, Instant};
//!
//! use arqlink_link::{ChannelStatus, Link, LinkConfig};
//! use arqlink_transport::MemoryTransport;
//!
//! let mut link = Link::new(MemoryTransport::new(), LinkConfig::default())?;
//! link.register(0)?;
//! loop {
//!     link.poll(Instant::now());
//!     if link.channel(0)?.connect(Duration::from_secs(5)) != ChannelStatus::Pending {
//!         break;
//!     }
//! }
//! # Ok::<(), arqlink_link::LinkError>(())
//! ```

pub mod arq;
pub mod channel;
pub mod config;
pub mod error;
pub mod link;
pub mod mux;
pub mod pool;
mod registry;
pub mod stats;

pub use arq::{RxState, TxState};
pub use channel::{ChannelState, ChannelStatus};
pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use link::{Link, ResetReason};
pub use mux::Channel;
pub use pool::{BufferHandle, BufferPool};
pub use stats::LinkStats;
