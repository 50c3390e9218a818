use std::collections::VecDeque;
use std::time::{Duration, Instant};

use arqlink_frame::{
    wire_bytes, Accumulated, ArqMessage, ChannelMessage, Frame, FrameAccumulator, Seq,
};
use arqlink_transport::{Transport, TransportError};
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::arq::{RxAction, RxState, TxState, TxTick};
use crate::channel::{ChannelAction, ChannelState, ChannelStatus};
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::mux::Channel;
use crate::pool::{BufferHandle, BufferPool};
use crate::registry::ChannelRegistry;
use crate::stats::LinkStats;

/// Free buffers that transmit-side acquisition leaves for the receive path.
const RX_RESERVE: usize = 1;

/// What triggered a link reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// [`Link::reset`] was called.
    Local,
    /// The peer asked for a reset, or answered a repeated request.
    PeerReset,
    /// A sequence number that cannot follow the held frame arrived.
    Desync,
    /// The in-flight frame was never acknowledged.
    RetryCeiling,
}

impl ResetReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetReason::Local => "local",
            ResetReason::PeerReset => "peer-reset",
            ResetReason::Desync => "desync",
            ResetReason::RetryCeiling => "retry-ceiling",
        }
    }
}

/// A reliable, multiplexed link over one byte transport.
///
/// Nothing happens between calls: [`Link::poll`] drains received bytes,
/// fires timers, and starts the next transmission. Channel operations run
/// against the clock of the most recent poll.
pub struct Link<T: Transport> {
    transport: T,
    config: LinkConfig,
    pool: BufferPool,
    tx_queue: VecDeque<BufferHandle>,
    tx: TxState,
    // Encoded head frame, resent verbatim on timeout.
    in_flight: Option<Bytes>,
    rx: RxState,
    accumulator: FrameAccumulator,
    channels: ChannelRegistry,
    stats: LinkStats,
    now: Instant,
    announce_pending: bool,
    // Set while our reset request is unanswered; holds the resend deadline.
    reset_pending: Option<Instant>,
    last_reset: Option<ResetReason>,
}

impl<T: Transport> Link<T> {
    /// Create a link with the given configuration.
    pub fn new(transport: T, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let pool_size = u16::try_from(config.pool_size)
            .map_err(|_| LinkError::InvalidConfig(format!("pool_size {}", config.pool_size)))?;

        Ok(Self {
            transport,
            pool: BufferPool::new(pool_size),
            tx_queue: VecDeque::with_capacity(config.max_tx_queue),
            tx: TxState::INITIAL,
            in_flight: None,
            rx: RxState::INITIAL,
            accumulator: FrameAccumulator::new(),
            channels: ChannelRegistry::new(config.max_channels),
            stats: LinkStats::default(),
            now: Instant::now(),
            announce_pending: config.announce_reset,
            reset_pending: None,
            last_reset: None,
            config,
        })
    }

    /// Create a link with [`LinkConfig::default`].
    pub fn with_defaults(transport: T) -> Result<Self> {
        Self::new(transport, LinkConfig::default())
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Clock of the last poll.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn tx_state(&self) -> TxState {
        self.tx
    }

    pub fn rx_state(&self) -> RxState {
        self.rx
    }

    pub fn last_reset(&self) -> Option<ResetReason> {
        self.last_reset
    }

    /// Frames queued for transmission, including the one in flight.
    pub fn tx_queue_len(&self) -> usize {
        self.tx_queue.len()
    }

    pub fn free_buffers(&self) -> usize {
        self.pool.available()
    }

    /// True while a reset request of ours waits for the peer's answer.
    pub fn is_resetting(&self) -> bool {
        self.reset_pending.is_some()
    }

    /// True when nothing is queued or awaiting acknowledgment.
    pub fn is_idle(&self) -> bool {
        self.tx.is_ready() && self.tx_queue.is_empty()
    }

    /// Fails once the underlying transport has closed.
    pub fn check_transport(&self) -> Result<()> {
        if self.transport.is_closed() {
            return Err(TransportError::Closed.into());
        }
        Ok(())
    }

    /// Run one step of the protocol at time `now`.
    pub fn poll(&mut self, now: Instant) {
        self.now = self.now.max(now);

        self.announce();

        while let Some(byte) = self.transport.get_byte() {
            match self.accumulator.push(byte) {
                Accumulated::Pending => {}
                Accumulated::Frame(Ok(frame)) => self.handle_frame(frame),
                Accumulated::Frame(Err(err)) => {
                    self.stats.corrupt_frames += 1;
                    warn!(error = %err, "discarding corrupt frame");
                }
                Accumulated::Overflow => {
                    self.stats.overflows += 1;
                    warn!("discarding oversized message");
                }
            }
        }

        self.check_retransmit();
        self.check_reset_request();
        self.check_channel_deadlines();
        self.pump_tx();
    }

    /// Drop all link state and tell the peer to do the same.
    pub fn reset(&mut self) {
        self.reset_link(ResetReason::Local, true);
    }

    // Buffer-level access.

    /// Take a free buffer for a caller-built frame.
    ///
    /// The last free buffer is kept for receiving, so this returns `None` once
    /// only one is left.
    pub fn acquire_buffer(&mut self) -> Option<BufferHandle> {
        self.acquire_tx()
    }

    pub fn buffer(&self, handle: &BufferHandle) -> &Frame {
        self.pool.frame(handle)
    }

    pub fn buffer_mut(&mut self, handle: &BufferHandle) -> &mut Frame {
        self.pool.frame_mut(handle)
    }

    /// Return an unsubmitted buffer to the pool.
    pub fn release_buffer(&mut self, handle: BufferHandle) {
        self.pool.release(handle);
    }

    /// Queue a filled buffer for reliable delivery.
    ///
    /// The ARQ tag is assigned at transmission. A full queue hands the buffer
    /// back with [`LinkError::QueueFull`].
    pub fn submit(
        &mut self,
        handle: BufferHandle,
    ) -> std::result::Result<(), (BufferHandle, LinkError)> {
        if self.tx_queue.len() >= self.config.max_tx_queue {
            let channel = self.pool.frame(&handle).channel;
            return Err((handle, LinkError::QueueFull(channel)));
        }
        self.tx_queue.push_back(handle);
        self.pump_tx();
        Ok(())
    }

    // Channels.

    pub fn register(&mut self, id: u8) -> Result<()> {
        self.channels.register(id)
    }

    /// Remove a channel and reclaim its buffers.
    ///
    /// A held inbound frame is acknowledged as it is released.
    pub fn deregister(&mut self, id: u8) -> Result<()> {
        let mut slot = self.channels.deregister(id)?;
        if let Some(handle) = slot.outbound.take() {
            self.pool.release(handle);
        }
        for handle in slot.inbound.drain(..) {
            self.release_rx(handle);
        }
        Ok(())
    }

    pub fn is_registered(&self, id: u8) -> bool {
        self.channels.is_registered(id)
    }

    /// Registered channel ids in ascending order.
    pub fn channel_ids(&self) -> Vec<u8> {
        self.channels.ids()
    }

    /// Borrow a handle to a registered channel.
    pub fn channel(&mut self, id: u8) -> Result<Channel<'_, T>> {
        if !self.channels.is_registered(id) {
            return Err(LinkError::UnknownChannel(id));
        }
        Ok(Channel::new(self, id))
    }

    pub(crate) fn channel_state(&self, id: u8) -> ChannelState {
        self.channels
            .get(id)
            .map_or(ChannelState::Disconnected, |slot| slot.state)
    }

    pub(crate) fn channel_write(&mut self, id: u8, byte: u8) -> Result<()> {
        let slot = self
            .channels
            .get(id)
            .ok_or(LinkError::UnknownChannel(id))?;
        if !slot.is_connected() {
            return Err(LinkError::NotConnected(id));
        }
        let full = slot
            .outbound
            .as_ref()
            .is_some_and(|handle| self.pool.frame(handle).is_full());
        if full {
            self.submit_outbound(id)?;
        }

        let slot = self
            .channels
            .get_mut(id)
            .ok_or(LinkError::UnknownChannel(id))?;
        if slot.outbound.is_none() {
            if self.pool.available() <= RX_RESERVE {
                return Err(LinkError::Busy(id));
            }
            let handle = self.pool.acquire().ok_or(LinkError::Busy(id))?;
            self.pool.frame_mut(&handle).channel = id;
            slot.outbound = Some(handle);
        }
        let mut full = false;
        if let Some(handle) = &slot.outbound {
            let frame = self.pool.frame_mut(handle);
            frame.push(byte);
            full = frame.is_full();
        }
        if full {
            // A rejected submit keeps the buffer for the next write or flush.
            if let Err(err) = self.submit_outbound(id) {
                trace!(channel = id, error = %err, "full assembly buffer held");
            }
        }
        Ok(())
    }

    pub(crate) fn channel_write_bytes(&mut self, id: u8, bytes: &[u8]) -> Result<usize> {
        let mut written = 0;
        for &byte in bytes {
            match self.channel_write(id, byte) {
                Ok(()) => written += 1,
                Err(err) if written == 0 => return Err(err),
                Err(_) => break,
            }
        }
        Ok(written)
    }

    /// Submit the channel's partial assembly buffer, if it holds anything.
    pub(crate) fn submit_outbound(&mut self, id: u8) -> Result<()> {
        let slot = self
            .channels
            .get_mut(id)
            .ok_or(LinkError::UnknownChannel(id))?;
        let Some(handle) = slot.outbound.take() else {
            return Ok(());
        };
        if self.pool.frame(&handle).is_empty() {
            slot.outbound = Some(handle);
            return Ok(());
        }
        self.pool.frame_mut(&handle).message = ChannelMessage::NoOp;

        match self.submit(handle) {
            Ok(()) => Ok(()),
            Err((handle, err)) => {
                match self.channels.get_mut(id) {
                    Some(slot) => slot.outbound = Some(handle),
                    None => self.pool.release(handle),
                }
                Err(err)
            }
        }
    }

    pub(crate) fn channel_read(&mut self, id: u8) -> Option<u8> {
        let slot = self.channels.get_mut(id)?;
        let frame = self.pool.frame(slot.inbound.front()?);
        let byte = frame.payload().get(slot.read_offset).copied()?;

        if slot.read_offset + 1 >= frame.len() {
            slot.read_offset = 0;
            let drained = slot.inbound.pop_front();
            if let Some(handle) = drained {
                self.release_rx(handle);
            }
        } else {
            slot.read_offset += 1;
        }
        Some(byte)
    }

    pub(crate) fn channel_peek(&self, id: u8) -> Option<u8> {
        let slot = self.channels.get(id)?;
        let frame = self.pool.frame(slot.inbound.front()?);
        frame.payload().get(slot.read_offset).copied()
    }

    pub(crate) fn channel_available(&self, id: u8) -> usize {
        let Some(slot) = self.channels.get(id) else {
            return 0;
        };
        let total: usize = slot
            .inbound
            .iter()
            .map(|handle| self.pool.frame(handle).len())
            .sum();
        total.saturating_sub(slot.read_offset)
    }

    pub(crate) fn channel_read_into(&mut self, id: u8, buf: &mut [u8]) -> usize {
        let mut read = 0;
        for out in buf.iter_mut() {
            match self.channel_read(id) {
                Some(byte) => {
                    *out = byte;
                    read += 1;
                }
                None => break,
            }
        }
        read
    }

    pub(crate) fn channel_connect(&mut self, id: u8, timeout: Duration) -> ChannelStatus {
        let can_queue = self.can_queue_control();
        let now = self.now;
        let Some(slot) = self.channels.get_mut(id) else {
            return ChannelStatus::Busy;
        };
        let (status, action) = slot.connect(now, timeout, can_queue);
        self.apply(id, action);
        status
    }

    pub(crate) fn channel_disconnect(&mut self, id: u8) -> ChannelStatus {
        if self.channel_state(id) == ChannelState::Connected && self.submit_outbound(id).is_err()
        {
            return ChannelStatus::Busy;
        }

        let can_queue = self.can_queue_control();
        let now = self.now;
        let timeout = self.config.disconnect_timeout;
        let Some(slot) = self.channels.get_mut(id) else {
            return ChannelStatus::Success;
        };
        let (status, action) = slot.disconnect(now, timeout, can_queue);
        if !slot.is_connected() {
            if let Some(handle) = slot.outbound.take() {
                self.pool.release(handle);
            }
        }
        self.apply(id, action);
        status
    }

    // Transmit half.

    fn acquire_tx(&mut self) -> Option<BufferHandle> {
        if self.pool.available() <= RX_RESERVE {
            return None;
        }
        self.pool.acquire()
    }

    fn can_queue_control(&self) -> bool {
        self.pool.available() > RX_RESERVE && self.tx_queue.len() < self.config.max_tx_queue
    }

    fn queue_control(&mut self, id: u8, message: ChannelMessage) -> Result<()> {
        if self.tx_queue.len() >= self.config.max_tx_queue {
            return Err(LinkError::QueueFull(id));
        }
        let handle = self.acquire_tx().ok_or(LinkError::Busy(id))?;
        let frame = self.pool.frame_mut(&handle);
        frame.channel = id;
        frame.message = message;
        debug!(channel = id, message = message.name(), "queueing control frame");

        self.submit(handle).map_err(|(handle, err)| {
            self.pool.release(handle);
            err
        })
    }

    fn apply(&mut self, id: u8, action: ChannelAction) {
        if let ChannelAction::Send(message) = action {
            if let Err(err) = self.queue_control(id, message) {
                warn!(channel = id, message = message.name(), error = %err, "control frame dropped");
            }
        }
    }

    fn pump_tx(&mut self) {
        self.announce();
        if self.reset_pending.is_some() {
            return;
        }
        let Some(head) = self.tx_queue.front() else {
            return;
        };
        let Some(seq) = self.tx.begin(self.now, self.config.retransmit_timeout) else {
            return;
        };
        let frame = self.pool.frame_mut(head);
        frame.arq = ArqMessage::Data(seq);
        let wire = wire_bytes(frame);
        debug!(
            channel = frame.channel,
            seq = %seq,
            message = frame.message.name(),
            len = frame.len(),
            "sending frame"
        );

        self.stats.frames_sent += 1;
        self.send_wire(&wire);
        self.in_flight = Some(wire);
    }

    fn check_retransmit(&mut self) {
        let tick = self.tx.on_tick(
            self.now,
            self.config.retransmit_timeout,
            self.config.max_retries,
        );
        match tick {
            TxTick::Idle => {}
            TxTick::Retransmit { attempts } => {
                if let Some(wire) = self.in_flight.clone() {
                    debug!(attempts, "retransmitting frame");
                    self.stats.retransmissions += 1;
                    self.send_wire(&wire);
                }
            }
            TxTick::RetriesExhausted => self.reset_link(ResetReason::RetryCeiling, true),
        }
    }

    fn check_channel_deadlines(&mut self) {
        let now = self.now;
        let mut expired = Vec::new();
        for slot in self.channels.iter_mut() {
            let action = slot.on_tick(now);
            if action != ChannelAction::None {
                expired.push((slot.id, action));
            }
        }
        for (id, action) in expired {
            self.apply(id, action);
        }
    }

    /// Resend an unanswered reset request.
    fn check_reset_request(&mut self) {
        let Some(deadline) = self.reset_pending else {
            return;
        };
        if self.now >= deadline {
            debug!("repeating reset request");
            self.stats.retransmissions += 1;
            self.request_reset();
        }
    }

    /// Send the startup reset ahead of anything else this link transmits.
    fn announce(&mut self) {
        if self.announce_pending {
            debug!("announcing reset to peer");
            self.request_reset();
        }
    }

    fn send_wire(&mut self, wire: &[u8]) {
        self.announce();
        self.transmit(wire);
    }

    fn transmit(&mut self, wire: &[u8]) {
        if let Err(err) = self.transport.send_bytes(wire) {
            warn!(error = %err, "transport send failed");
        }
    }

    fn send_ack(&mut self, seq: Seq) {
        trace!(seq = %seq, "sending ack");
        self.stats.acks_sent += 1;
        self.send_wire(&wire_bytes(&Frame::ack(seq)));
    }

    /// Ask the peer to reset. Session traffic waits until it answers.
    fn request_reset(&mut self) {
        self.announce_pending = false;
        self.reset_pending = Some(self.now + self.config.retransmit_timeout);
        self.transmit(&wire_bytes(&Frame::reset()));
    }

    // Receive half.

    fn handle_frame(&mut self, frame: Frame) {
        self.stats.frames_received += 1;

        if frame.message == ChannelMessage::Reset {
            match frame.arq {
                ArqMessage::Data(_) => self.on_reset_request(),
                ArqMessage::Ack(_) => self.on_reset_answer(),
            }
            return;
        }

        // Sent before the peer saw our request.
        if self.reset_pending.is_some() {
            self.stats.ignored_during_reset += 1;
            trace!(channel = frame.channel, "ignoring frame while resetting");
            return;
        }

        match frame.arq {
            ArqMessage::Ack(seq) => self.on_ack(seq),
            ArqMessage::Data(seq) => self.on_data(seq, frame),
        }
    }

    fn on_reset_request(&mut self) {
        self.stats.peer_resets += 1;
        // With our own request outstanding nothing has been exchanged since
        // our last reset, so there is no state to drop.
        if self.reset_pending.is_none() {
            self.reset_link(ResetReason::PeerReset, false);
        }
        debug!("answering reset request");
        self.send_wire(&wire_bytes(&Frame::reset_ack()));
    }

    fn on_reset_answer(&mut self) {
        if self.reset_pending.take().is_some() {
            debug!("peer answered reset");
            self.pump_tx();
            return;
        }
        // The peer reset again on a repeated request, after we had already
        // resumed. Everything since our resume is gone on its side.
        self.stats.peer_resets += 1;
        self.reset_link(ResetReason::PeerReset, false);
    }

    fn on_ack(&mut self, seq: Seq) {
        if !self.tx.on_ack(seq) {
            trace!(seq = %seq, "ignoring unexpected ack");
            return;
        }
        debug!(seq = %seq, "frame acknowledged");
        self.stats.acks_received += 1;
        self.in_flight = None;
        if let Some(handle) = self.tx_queue.pop_front() {
            self.pool.release(handle);
        }
        self.pump_tx();
    }

    fn on_data(&mut self, seq: Seq, frame: Frame) {
        if self.pool.available() == 0 {
            self.stats.dropped_no_buffer += 1;
            debug!(channel = frame.channel, seq = %seq, "no free buffer, dropping frame");
            return;
        }

        match self.rx.on_data(seq) {
            RxAction::Duplicate => {
                self.stats.duplicates += 1;
                debug!(channel = frame.channel, seq = %seq, "duplicate of held frame");
            }
            RxAction::ReAck(seq) => {
                self.stats.duplicates += 1;
                debug!(channel = frame.channel, seq = %seq, "retransmission, repeating ack");
                self.send_ack(seq);
            }
            RxAction::Desync => {
                warn!(channel = frame.channel, seq = %seq, "sequence desynchronized");
                self.reset_link(ResetReason::Desync, true);
            }
            RxAction::Accept(seq) => {
                let Some(handle) = self.pool.acquire() else {
                    return;
                };
                debug!(
                    channel = frame.channel,
                    seq = %seq,
                    message = frame.message.name(),
                    len = frame.len(),
                    "frame received"
                );
                *self.pool.frame_mut(&handle) = frame;
                self.rx = RxState::AwaitingRelease(seq);
                self.dispatch(handle);
            }
        }
    }

    fn dispatch(&mut self, handle: BufferHandle) {
        let frame = self.pool.frame(&handle);
        let (id, message, len) = (frame.channel, frame.message, frame.len());

        let Some(slot) = self.channels.get_mut(id) else {
            debug!(channel = id, "frame for unregistered channel");
            self.release_rx(handle);
            if message != ChannelMessage::Disconnect {
                self.apply(id, ChannelAction::Send(ChannelMessage::Disconnect));
            }
            return;
        };

        match message {
            ChannelMessage::NoOp if len > 0 && slot.is_connected() => {
                slot.inbound.push_back(handle);
                self.stats.frames_delivered += 1;
            }
            ChannelMessage::NoOp => {
                let refuse = len > 0 && slot.state == ChannelState::Disconnected;
                self.release_rx(handle);
                if refuse {
                    self.apply(id, ChannelAction::Send(ChannelMessage::Disconnect));
                }
            }
            ChannelMessage::Connect | ChannelMessage::Disconnect => {
                let was_connected = slot.is_connected();
                let action = slot.on_peer(message);
                if was_connected && !slot.is_connected() {
                    for dropped in slot.take_buffers() {
                        self.pool.release(dropped);
                    }
                }
                self.release_rx(handle);
                self.apply(id, action);
            }
            // Filtered in handle_frame.
            ChannelMessage::Reset => self.pool.release(handle),
        }
    }

    /// Return a received buffer and acknowledge the frame it held.
    fn release_rx(&mut self, handle: BufferHandle) {
        self.pool.release(handle);
        if let Some(seq) = self.rx.on_release() {
            self.send_ack(seq);
        }
    }

    fn reset_link(&mut self, reason: ResetReason, notify: bool) {
        warn!(reason = reason.as_str(), "link reset");

        for handle in self.tx_queue.drain(..) {
            self.pool.release(handle);
        }
        self.in_flight = None;
        self.tx = TxState::INITIAL;
        self.rx = RxState::INITIAL;
        for slot in self.channels.iter_mut() {
            for handle in slot.reset() {
                self.pool.release(handle);
            }
        }

        self.stats.resets += 1;
        self.last_reset = Some(reason);
        if notify {
            self.request_reset();
        }
    }
}

impl<T: Transport> std::fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("tx", &self.tx)
            .field("rx", &self.rx)
            .field("tx_queue", &self.tx_queue.len())
            .field("free_buffers", &self.pool.available())
            .field("resetting", &self.reset_pending.is_some())
            .field("channels", &self.channels.ids())
            .finish_non_exhaustive()
    }
}
