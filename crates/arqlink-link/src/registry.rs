use tracing::debug;

use crate::channel::ChannelSlot;
use crate::error::{LinkError, Result};

/// Fixed-size id to channel lookup table.
///
/// Receiving a frame for an empty slot never creates a channel.
#[derive(Debug)]
pub(crate) struct ChannelRegistry {
    slots: Vec<Option<ChannelSlot>>,
}

impl ChannelRegistry {
    pub(crate) fn new(max_channels: u8) -> Self {
        Self {
            slots: (0..max_channels).map(|_| None).collect(),
        }
    }

    pub(crate) fn max_channels(&self) -> u8 {
        u8::try_from(self.slots.len()).unwrap_or(u8::MAX)
    }

    pub(crate) fn register(&mut self, id: u8) -> Result<()> {
        let max = self.max_channels();
        let slot = self
            .slots
            .get_mut(usize::from(id))
            .ok_or(LinkError::ChannelOutOfRange { id, max })?;
        if slot.is_some() {
            return Err(LinkError::ChannelAlreadyRegistered(id));
        }
        *slot = Some(ChannelSlot::new(id));
        debug!(channel = id, "channel registered");
        Ok(())
    }

    /// Remove a channel, returning its slot so the caller can reclaim buffers.
    pub(crate) fn deregister(&mut self, id: u8) -> Result<ChannelSlot> {
        let slot = self
            .slots
            .get_mut(usize::from(id))
            .and_then(Option::take)
            .ok_or(LinkError::UnknownChannel(id))?;
        debug!(channel = id, "channel deregistered");
        Ok(slot)
    }

    pub(crate) fn get(&self, id: u8) -> Option<&ChannelSlot> {
        self.slots.get(usize::from(id)).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: u8) -> Option<&mut ChannelSlot> {
        self.slots.get_mut(usize::from(id)).and_then(Option::as_mut)
    }

    pub(crate) fn is_registered(&self, id: u8) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelSlot> {
        self.slots.iter_mut().flatten()
    }

    pub(crate) fn ids(&self) -> Vec<u8> {
        self.slots.iter().flatten().map(|slot| slot.id).collect()
    }
}
