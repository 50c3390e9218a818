use crate::error::Result;

/// A polled, non-blocking byte medium.
///
/// Reads are byte-at-a-time and only valid after [`available`](Transport::available)
/// returned `true`. Sends are best effort: a short or failed write is reported,
/// but recovery is the job of the link layer's retransmission timer.
pub trait Transport {
    /// Whether at least one byte can be read without blocking.
    fn available(&mut self) -> bool;

    /// Take the next received byte, or `None` if nothing is pending.
    fn get_byte(&mut self) -> Option<u8>;

    /// Send a run of bytes.
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Send a single byte.
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.send_bytes(&[byte])
    }

    /// Whether the medium has been closed and will never produce bytes again.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn available(&mut self) -> bool {
        (**self).available()
    }

    fn get_byte(&mut self) -> Option<u8> {
        (**self).get_byte()
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send_bytes(bytes)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn available(&mut self) -> bool {
        (**self).available()
    }

    fn get_byte(&mut self) -> Option<u8> {
        (**self).get_byte()
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send_bytes(bytes)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
