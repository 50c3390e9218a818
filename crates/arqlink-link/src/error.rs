/// Errors that can occur in link and channel operations.
///
/// Protocol faults (corrupt frames, desync, peer resets) are never reported
/// here; the link recovers from those on its own.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] arqlink_transport::TransportError),

    /// The configuration is unusable.
    #[error("invalid link config: {0}")]
    InvalidConfig(String),

    /// Channel id is outside the configured range.
    #[error("channel {id} out of range (max {max})")]
    ChannelOutOfRange { id: u8, max: u8 },

    /// Channel id is already registered.
    #[error("channel {0} already registered")]
    ChannelAlreadyRegistered(u8),

    /// Channel id is not registered.
    #[error("channel {0} not registered")]
    UnknownChannel(u8),

    /// The channel is not connected.
    #[error("channel {0} not connected")]
    NotConnected(u8),

    /// No free buffer; retry after the next poll.
    #[error("channel {0} busy: no free buffer")]
    Busy(u8),

    /// The transmit queue is full; retry after the next poll.
    #[error("channel {0} busy: transmit queue full")]
    QueueFull(u8),
}

impl LinkError {
    /// Whether retrying after a later poll can succeed.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, LinkError::Busy(_) | LinkError::QueueFull(_))
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
