//! Fixed arena of frame buffers with move-only handles.

use std::collections::VecDeque;

use arqlink_frame::Frame;

/// Ownership token for one pool slot.
///
/// Deliberately neither `Clone` nor `Copy`: whoever holds the handle owns the
/// buffer, and giving it to a queue or back to the pool moves it.
#[derive(Debug, PartialEq, Eq)]
pub struct BufferHandle(u16);

impl BufferHandle {
    /// Slot index, for diagnostics.
    pub fn index(&self) -> usize {
        usize::from(self.0)
    }
}

/// A bounded set of reusable frame buffers.
///
/// Free buffers are handed out oldest-released first.
#[derive(Debug)]
pub struct BufferPool {
    slots: Vec<Frame>,
    free: VecDeque<BufferHandle>,
}

impl BufferPool {
    /// Allocate `capacity` buffers. Capacity never changes afterwards.
    pub fn new(capacity: u16) -> Self {
        Self {
            slots: vec![Frame::default(); usize::from(capacity)],
            free: (0..capacity).map(BufferHandle).collect(),
        }
    }

    /// Take the oldest free buffer, or `None` if all are in use.
    pub fn acquire(&mut self) -> Option<BufferHandle> {
        self.free.pop_front()
    }

    /// Return a buffer. Its frame is cleared.
    pub fn release(&mut self, handle: BufferHandle) {
        self.slots[handle.index()].clear();
        self.free.push_back(handle);
    }

    pub fn frame(&self, handle: &BufferHandle) -> &Frame {
        &self.slots[handle.index()]
    }

    pub fn frame_mut(&mut self, handle: &BufferHandle) -> &mut Frame {
        &mut self.slots[handle.index()]
    }

    /// Number of free buffers.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
