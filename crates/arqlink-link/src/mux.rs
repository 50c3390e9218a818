use std::time::Duration;

use arqlink_transport::Transport;

use crate::channel::{ChannelState, ChannelStatus};
use crate::error::Result;
use crate::link::Link;

/// Byte-stream view of one registered channel.
///
/// Holds the link mutably, so only one channel handle exists at a time.
pub struct Channel<'a, T: Transport> {
    link: &'a mut Link<T>,
    id: u8,
}

impl<'a, T: Transport> Channel<'a, T> {
    pub(crate) fn new(link: &'a mut Link<T>, id: u8) -> Self {
        Self { link, id }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.link.channel_state(self.id)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Append one byte to the outgoing assembly buffer.
    ///
    /// A buffer that fills up is submitted immediately. Fails with
    /// `NotConnected` outside the connected state, `Busy` when no buffer is
    /// free and `QueueFull` when a full buffer cannot be submitted.
    pub fn write(&mut self, byte: u8) -> Result<()> {
        self.link.channel_write(self.id, byte)
    }

    /// Write as many bytes as currently fit.
    ///
    /// Errors only when not a single byte could be taken.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        self.link.channel_write_bytes(self.id, bytes)
    }

    /// Submit a partially filled assembly buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.link.submit_outbound(self.id)
    }

    pub fn read(&mut self) -> Option<u8> {
        self.link.channel_read(self.id)
    }

    pub fn peek(&self) -> Option<u8> {
        self.link.channel_peek(self.id)
    }

    /// Unread bytes across all received buffers.
    pub fn available(&self) -> usize {
        self.link.channel_available(self.id)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.link.channel_read_into(self.id, buf)
    }

    /// Open the channel, or report progress of an open in flight.
    ///
    /// Non-blocking: poll the link and call again while `Pending`.
    pub fn connect(&mut self, timeout: Duration) -> ChannelStatus {
        self.link.channel_connect(self.id, timeout)
    }

    /// Close the channel, waiting for the peer's matching disconnect.
    pub fn disconnect(&mut self) -> ChannelStatus {
        self.link.channel_disconnect(self.id)
    }
}

impl<T: Transport> std::fmt::Debug for Channel<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("available", &self.available())
            .finish()
    }
}
