use std::time::Duration;

use arqlink_frame::DEFAULT_MAX_CHANNELS;

use crate::error::{LinkError, Result};

/// Configuration for a [`Link`](crate::Link).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Number of frame buffers, allocated once. One is always kept back for
    /// receiving, so at least two are needed.
    pub pool_size: usize,
    /// Maximum frames waiting in the transmit queue (in-flight frame included).
    pub max_tx_queue: usize,
    /// Channel ids run from 0 to `max_channels - 1`.
    pub max_channels: u8,
    /// Time to wait for an acknowledgment before resending.
    pub retransmit_timeout: Duration,
    /// Resends of one frame before the link is reset. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Time to wait for the peer's half of a disconnect.
    pub disconnect_timeout: Duration,
    /// Send a reset request on the first poll so a stale peer resynchronizes.
    pub announce_reset: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            max_tx_queue: 4,
            max_channels: DEFAULT_MAX_CHANNELS,
            retransmit_timeout: Duration::from_millis(500),
            max_retries: Some(10),
            disconnect_timeout: Duration::from_secs(2),
            announce_reset: true,
        }
    }
}

impl LinkConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.pool_size < 2 || self.pool_size > usize::from(u16::MAX) {
            return Err(LinkError::InvalidConfig(format!(
                "pool_size must be in 2..={}, got {}",
                u16::MAX,
                self.pool_size
            )));
        }
        if self.max_tx_queue == 0 {
            return Err(LinkError::InvalidConfig(
                "max_tx_queue must be at least 1".to_string(),
            ));
        }
        if self.max_channels == 0 {
            return Err(LinkError::InvalidConfig(
                "max_channels must be at least 1".to_string(),
            ));
        }
        if self.retransmit_timeout.is_zero() {
            return Err(LinkError::InvalidConfig(
                "retransmit_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
