//! Per-channel connection state machine.
//!
//! A connect or disconnect request doubles as the acknowledgment of the
//! peer's request, so both sides can open (or close) at the same time
//! without either declaring success before it has seen the other's intent.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use arqlink_frame::ChannelMessage;
use tracing::info;

use crate::pool::BufferHandle;

/// Connection state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    ConnectPending { deadline: Instant },
    Connected,
    DisconnectPending { deadline: Instant },
}

impl ChannelState {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::ConnectPending { .. } => "connect-pending",
            ChannelState::Connected => "connected",
            ChannelState::DisconnectPending { .. } => "disconnect-pending",
        }
    }
}

/// Result of a connection-management call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The requested state has been reached.
    Success,
    /// Cannot start now (no buffer, queue full, or teardown in progress).
    Busy,
    /// In progress; call again after polling.
    Pending,
    /// The peer did not answer in time.
    TimedOut,
    /// The attempt was cut short by the peer or by a link reset.
    PeerDisconnected,
}

/// Control frame the caller has to queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelAction {
    None,
    Send(ChannelMessage),
}

/// Registry entry for one channel.
#[derive(Debug)]
pub(crate) struct ChannelSlot {
    pub(crate) id: u8,
    pub(crate) state: ChannelState,
    pub(crate) inbound: VecDeque<BufferHandle>,
    pub(crate) read_offset: usize,
    pub(crate) outbound: Option<BufferHandle>,
    pub(crate) peer_requested: bool,
    interrupted: Option<ChannelStatus>,
}

impl ChannelSlot {
    pub(crate) fn new(id: u8) -> Self {
        Self {
            id,
            state: ChannelState::Disconnected,
            inbound: VecDeque::new(),
            read_offset: 0,
            outbound: None,
            peer_requested: false,
            interrupted: None,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    fn set_state(&mut self, state: ChannelState) {
        if self.state.name() != state.name() {
            info!(
                channel = self.id,
                from = self.state.name(),
                to = state.name(),
                "channel state change"
            );
        }
        self.state = state;
    }

    /// Report the end of an interrupted connect attempt once.
    pub(crate) fn take_interrupted(&mut self) -> Option<ChannelStatus> {
        self.interrupted.take()
    }

    /// Local connect request. Returns the status and whether a Connect frame
    /// has to go out; `can_queue` says whether one fits right now.
    pub(crate) fn connect(
        &mut self,
        now: Instant,
        timeout: Duration,
        can_queue: bool,
    ) -> (ChannelStatus, ChannelAction) {
        if let Some(status) = self.take_interrupted() {
            return (status, ChannelAction::None);
        }
        match self.state {
            ChannelState::Connected => (ChannelStatus::Success, ChannelAction::None),
            ChannelState::DisconnectPending { .. } => (ChannelStatus::Busy, ChannelAction::None),
            ChannelState::ConnectPending { deadline } => {
                if now >= deadline {
                    self.set_state(ChannelState::Disconnected);
                    (
                        ChannelStatus::TimedOut,
                        ChannelAction::Send(ChannelMessage::Disconnect),
                    )
                } else {
                    (ChannelStatus::Pending, ChannelAction::None)
                }
            }
            ChannelState::Disconnected if !can_queue => (ChannelStatus::Busy, ChannelAction::None),
            ChannelState::Disconnected => {
                if self.peer_requested {
                    self.peer_requested = false;
                    self.set_state(ChannelState::Connected);
                    (
                        ChannelStatus::Success,
                        ChannelAction::Send(ChannelMessage::Connect),
                    )
                } else {
                    self.set_state(ChannelState::ConnectPending {
                        deadline: now + timeout,
                    });
                    (
                        ChannelStatus::Pending,
                        ChannelAction::Send(ChannelMessage::Connect),
                    )
                }
            }
        }
    }

    /// Local disconnect request.
    pub(crate) fn disconnect(
        &mut self,
        now: Instant,
        timeout: Duration,
        can_queue: bool,
    ) -> (ChannelStatus, ChannelAction) {
        match self.state {
            ChannelState::Disconnected => (ChannelStatus::Success, ChannelAction::None),
            ChannelState::Connected if !can_queue => (ChannelStatus::Busy, ChannelAction::None),
            ChannelState::Connected => {
                self.set_state(ChannelState::DisconnectPending {
                    deadline: now + timeout,
                });
                (
                    ChannelStatus::Pending,
                    ChannelAction::Send(ChannelMessage::Disconnect),
                )
            }
            ChannelState::DisconnectPending { deadline } => {
                if now >= deadline {
                    self.set_state(ChannelState::Disconnected);
                    (ChannelStatus::Success, ChannelAction::None)
                } else {
                    (ChannelStatus::Pending, ChannelAction::None)
                }
            }
            ChannelState::ConnectPending { .. } => {
                self.set_state(ChannelState::Disconnected);
                (
                    ChannelStatus::Success,
                    ChannelAction::Send(ChannelMessage::Disconnect),
                )
            }
        }
    }

    /// A Connect or Disconnect from the peer.
    pub(crate) fn on_peer(&mut self, message: ChannelMessage) -> ChannelAction {
        match (message, self.state) {
            (ChannelMessage::Connect, ChannelState::Disconnected) => {
                self.peer_requested = true;
                ChannelAction::None
            }
            (ChannelMessage::Connect, ChannelState::ConnectPending { .. }) => {
                self.set_state(ChannelState::Connected);
                ChannelAction::None
            }
            (ChannelMessage::Disconnect, ChannelState::Disconnected) => {
                self.peer_requested = false;
                ChannelAction::None
            }
            (ChannelMessage::Disconnect, ChannelState::ConnectPending { .. }) => {
                self.set_state(ChannelState::Disconnected);
                self.interrupted = Some(ChannelStatus::PeerDisconnected);
                ChannelAction::None
            }
            (ChannelMessage::Disconnect, ChannelState::Connected) => {
                self.set_state(ChannelState::Disconnected);
                ChannelAction::Send(ChannelMessage::Disconnect)
            }
            (ChannelMessage::Disconnect, ChannelState::DisconnectPending { .. }) => {
                self.set_state(ChannelState::Disconnected);
                ChannelAction::None
            }
            // Already open, or closing: a late Connect needs no answer.
            _ => ChannelAction::None,
        }
    }

    /// Deadline check run on every poll.
    pub(crate) fn on_tick(&mut self, now: Instant) -> ChannelAction {
        match self.state {
            ChannelState::ConnectPending { deadline } if now >= deadline => {
                self.set_state(ChannelState::Disconnected);
                self.interrupted = Some(ChannelStatus::TimedOut);
                ChannelAction::Send(ChannelMessage::Disconnect)
            }
            ChannelState::DisconnectPending { deadline } if now >= deadline => {
                self.set_state(ChannelState::Disconnected);
                ChannelAction::None
            }
            _ => ChannelAction::None,
        }
    }

    /// Link reset: force Disconnected and hand back every held buffer.
    pub(crate) fn reset(&mut self) -> Vec<BufferHandle> {
        if matches!(self.state, ChannelState::ConnectPending { .. }) {
            self.interrupted = Some(ChannelStatus::PeerDisconnected);
        }
        self.set_state(ChannelState::Disconnected);
        self.peer_requested = false;
        self.take_buffers()
    }

    /// Remove all inbound and outbound buffers.
    pub(crate) fn take_buffers(&mut self) -> Vec<BufferHandle> {
        self.read_offset = 0;
        let mut buffers: Vec<BufferHandle> = self.inbound.drain(..).collect();
        buffers.extend(self.outbound.take());
        buffers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn connect_waits_for_peer() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(1);

        let (status, action) = slot.connect(now, TIMEOUT, true);
        assert_eq!(status, ChannelStatus::Pending);
        assert_eq!(action, ChannelAction::Send(ChannelMessage::Connect));

        let (status, action) = slot.connect(now, TIMEOUT, true);
        assert_eq!(status, ChannelStatus::Pending);
        assert_eq!(action, ChannelAction::None);

        assert_eq!(slot.on_peer(ChannelMessage::Connect), ChannelAction::None);
        assert!(slot.is_connected());
        assert_eq!(slot.connect(now, TIMEOUT, true).0, ChannelStatus::Success);
    }

    #[test]
    fn connect_after_peer_request_is_immediate() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(1);
        slot.on_peer(ChannelMessage::Connect);
        assert!(slot.peer_requested);
        assert_eq!(slot.state, ChannelState::Disconnected);

        let (status, action) = slot.connect(now, TIMEOUT, true);
        assert_eq!(status, ChannelStatus::Success);
        assert_eq!(action, ChannelAction::Send(ChannelMessage::Connect));
        assert!(slot.is_connected());
    }

    #[test]
    fn peer_cancel_clears_request() {
        let mut slot = ChannelSlot::new(1);
        slot.on_peer(ChannelMessage::Connect);
        slot.on_peer(ChannelMessage::Disconnect);
        assert!(!slot.peer_requested);
    }

    #[test]
    fn connect_times_out_on_call() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(2);
        slot.connect(now, TIMEOUT, true);

        let (status, action) = slot.connect(now + TIMEOUT, TIMEOUT, true);
        assert_eq!(status, ChannelStatus::TimedOut);
        assert_eq!(action, ChannelAction::Send(ChannelMessage::Disconnect));
        assert_eq!(slot.state, ChannelState::Disconnected);
    }

    #[test]
    fn connect_times_out_on_tick_and_reports_once() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(2);
        slot.connect(now, TIMEOUT, true);

        assert_eq!(slot.on_tick(now), ChannelAction::None);
        assert_eq!(
            slot.on_tick(now + TIMEOUT),
            ChannelAction::Send(ChannelMessage::Disconnect)
        );
        assert_eq!(slot.connect(now, TIMEOUT, true).0, ChannelStatus::TimedOut);
        assert_eq!(slot.connect(now, TIMEOUT, true).0, ChannelStatus::Pending);
    }

    #[test]
    fn busy_without_queue_space() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(0);
        assert_eq!(
            slot.connect(now, TIMEOUT, false),
            (ChannelStatus::Busy, ChannelAction::None)
        );
        assert_eq!(slot.state, ChannelState::Disconnected);
    }

    #[test]
    fn two_sided_disconnect() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(3);
        slot.state = ChannelState::Connected;

        let (status, action) = slot.disconnect(now, TIMEOUT, true);
        assert_eq!(status, ChannelStatus::Pending);
        assert_eq!(action, ChannelAction::Send(ChannelMessage::Disconnect));
        assert_eq!(slot.connect(now, TIMEOUT, true).0, ChannelStatus::Busy);

        assert_eq!(slot.on_peer(ChannelMessage::Disconnect), ChannelAction::None);
        assert_eq!(slot.disconnect(now, TIMEOUT, true).0, ChannelStatus::Success);
    }

    #[test]
    fn peer_disconnect_while_connected_is_answered() {
        let mut slot = ChannelSlot::new(3);
        slot.state = ChannelState::Connected;
        assert_eq!(
            slot.on_peer(ChannelMessage::Disconnect),
            ChannelAction::Send(ChannelMessage::Disconnect)
        );
        assert_eq!(slot.state, ChannelState::Disconnected);
    }

    #[test]
    fn disconnect_times_out_to_disconnected() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(3);
        slot.state = ChannelState::Connected;
        slot.disconnect(now, TIMEOUT, true);

        assert_eq!(
            slot.disconnect(now + TIMEOUT, TIMEOUT, true).0,
            ChannelStatus::Success
        );
        assert_eq!(slot.state, ChannelState::Disconnected);
    }

    #[test]
    fn peer_refusal_reports_peer_disconnected() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(4);
        slot.connect(now, TIMEOUT, true);
        slot.on_peer(ChannelMessage::Disconnect);

        assert_eq!(
            slot.connect(now, TIMEOUT, true).0,
            ChannelStatus::PeerDisconnected
        );
    }

    #[test]
    fn late_connect_on_open_channel_is_ignored() {
        let mut slot = ChannelSlot::new(4);
        slot.state = ChannelState::Connected;
        assert_eq!(slot.on_peer(ChannelMessage::Connect), ChannelAction::None);
        assert!(slot.is_connected());
    }

    #[test]
    fn reset_interrupts_pending_connect() {
        let now = Instant::now();
        let mut slot = ChannelSlot::new(5);
        slot.connect(now, TIMEOUT, true);

        assert!(slot.reset().is_empty());
        assert_eq!(slot.state, ChannelState::Disconnected);
        assert_eq!(
            slot.connect(now, TIMEOUT, true).0,
            ChannelStatus::PeerDisconnected
        );
    }
}
