use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// In-memory transport with an injectable receive queue and a captured send log.
///
/// Nothing is connected to anything: a test harness (or simulator) moves bytes
/// between two instances with [`take_sent`](Self::take_sent) and
/// [`inject`](Self::inject), dropping or corrupting them on the way as needed.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<u8>,
    outbound: BytesMut,
    closed: bool,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if they had arrived from the remote side.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Bytes sent so far and not yet taken.
    pub fn sent(&self) -> &[u8] {
        &self.outbound
    }

    /// Take everything sent so far.
    pub fn take_sent(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    /// Number of received bytes not yet read.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Close the transport: further sends fail and no more bytes are produced.
    pub fn close(&mut self) {
        self.closed = true;
        self.inbound.clear();
    }
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> bool {
        !self.inbound.is_empty()
    }

    fn get_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
