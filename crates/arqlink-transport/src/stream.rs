use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

const READ_CHUNK_SIZE: usize = 256;
const MAX_WOULD_BLOCK_SPINS: usize = 1024;

/// Adapts a non-blocking `Read + Write` stream to the polled [`Transport`] API.
///
/// The stream must already be in non-blocking mode (or have a very short read
/// timeout). `WouldBlock` and `TimedOut` mean "nothing available"; EOF or any
/// other read error marks the transport closed.
pub struct StreamTransport<S> {
    inner: S,
    buf: BytesMut,
    closed: bool,
}

impl<S: Read + Write> StreamTransport<S> {
    /// Wrap a non-blocking stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            closed: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn fill(&mut self) {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    debug!("stream reached end of file");
                    self.closed = true;
                    return;
                }
                Ok(n) => {
                    trace!(bytes = n, "read from stream");
                    self.buf.extend_from_slice(&chunk[..n]);
                    return;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "stream read failed; closing transport");
                    self.closed = true;
                    return;
                }
            }
        }
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn available(&mut self) -> bool {
        if self.buf.is_empty() && !self.closed {
            self.fill();
        }
        !self.buf.is_empty()
    }

    fn get_byte(&mut self) -> Option<u8> {
        if !self.available() {
            return None;
        }
        Some(self.buf.get_u8())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut offset = 0usize;
        let mut spins = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => {
                    self.closed = true;
                    return Err(TransportError::Closed);
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    spins += 1;
                    if spins > MAX_WOULD_BLOCK_SPINS {
                        return Err(TransportError::Io(err));
                    }
                    std::thread::yield_now();
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed && self.buf.is_empty()
    }
}

impl<S> std::fmt::Debug for StreamTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("buffered", &self.buf.len())
            .field("closed", &self.closed)
            .finish()
    }
}
