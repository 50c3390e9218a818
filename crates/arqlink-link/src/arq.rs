//! Stop-and-wait state machines.
//!
//! Both halves are plain values with transition methods that report what the
//! caller has to do (send, resend, ack, reset). They never touch the transport
//! or the buffer pool, so they can be driven directly in tests.

use std::time::{Duration, Instant};

use arqlink_frame::Seq;

/// Transmit half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Idle; the next frame goes out with this sequence.
    Ready(Seq),
    /// One frame is in flight.
    AwaitingAck {
        seq: Seq,
        deadline: Instant,
        /// Times the frame has been put on the wire.
        attempts: u32,
    },
}

/// What a timer check asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxTick {
    /// Nothing due.
    Idle,
    /// Resend the cached in-flight frame.
    Retransmit { attempts: u32 },
    /// The retry ceiling was reached; reset the link.
    RetriesExhausted,
}

impl TxState {
    pub const INITIAL: TxState = TxState::Ready(Seq::Zero);

    pub fn is_ready(&self) -> bool {
        matches!(self, TxState::Ready(_))
    }

    /// Sequence of the frame in flight, if any.
    pub fn in_flight(&self) -> Option<Seq> {
        match self {
            TxState::Ready(_) => None,
            TxState::AwaitingAck { seq, .. } => Some(*seq),
        }
    }

    /// Start sending the next frame. Returns the sequence to stamp on it, or
    /// `None` if a frame is already in flight.
    pub fn begin(&mut self, now: Instant, timeout: Duration) -> Option<Seq> {
        let TxState::Ready(seq) = *self else {
            return None;
        };
        *self = TxState::AwaitingAck {
            seq,
            deadline: now + timeout,
            attempts: 1,
        };
        Some(seq)
    }

    /// Handle an acknowledgment. Returns `true` if it completed the frame in
    /// flight; stale and duplicate acks leave the state untouched.
    pub fn on_ack(&mut self, acked: Seq) -> bool {
        match *self {
            TxState::AwaitingAck { seq, .. } if seq == acked => {
                *self = TxState::Ready(seq.flip());
                true
            }
            _ => false,
        }
    }

    /// Check the retransmission timer.
    pub fn on_tick(&mut self, now: Instant, timeout: Duration, max_retries: Option<u32>) -> TxTick {
        let TxState::AwaitingAck {
            seq,
            deadline,
            attempts,
        } = *self
        else {
            return TxTick::Idle;
        };
        if now < deadline {
            return TxTick::Idle;
        }
        if max_retries.is_some_and(|max| attempts > max) {
            return TxTick::RetriesExhausted;
        }
        let attempts = attempts.saturating_add(1);
        *self = TxState::AwaitingAck {
            seq,
            deadline: now + timeout,
            attempts,
        };
        TxTick::Retransmit { attempts }
    }
}

/// Receive half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Ready for the data frame with this sequence.
    Awaiting(Seq),
    /// Holding the frame with this sequence; its ack goes out when the buffer
    /// comes back.
    AwaitingRelease(Seq),
}

/// How to treat an incoming data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxAction {
    /// New frame: take it, then move to [`RxState::AwaitingRelease`].
    Accept(Seq),
    /// Retransmission of the frame we are holding.
    Duplicate,
    /// The peer missed our ack for this sequence; send it again.
    ReAck(Seq),
    /// No valid interpretation; reset the link.
    Desync,
}

impl RxState {
    pub const INITIAL: RxState = RxState::Awaiting(Seq::Zero);

    /// Classify a data frame without changing state.
    pub fn on_data(self, seq: Seq) -> RxAction {
        match self {
            RxState::Awaiting(expected) if seq == expected => RxAction::Accept(seq),
            RxState::Awaiting(_) => RxAction::ReAck(seq),
            RxState::AwaitingRelease(held) if seq == held => RxAction::Duplicate,
            RxState::AwaitingRelease(_) => RxAction::Desync,
        }
    }

    /// The held buffer is back in the pool. Returns the sequence to ack.
    pub fn on_release(&mut self) -> Option<Seq> {
        match *self {
            RxState::AwaitingRelease(seq) => {
                *self = RxState::Awaiting(seq.flip());
                Some(seq)
            }
            RxState::Awaiting(_) => None,
        }
    }
}
