use serde::Serialize;

/// Counters kept by a [`Link`](crate::Link) since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Data frames sent for the first time.
    pub frames_sent: u64,
    pub retransmissions: u64,
    pub acks_sent: u64,
    /// Acks that completed the in-flight frame.
    pub acks_received: u64,
    /// Well-formed frames of any kind.
    pub frames_received: u64,
    /// Payload frames handed to a channel.
    pub frames_delivered: u64,
    pub duplicates: u64,
    /// Frames that failed armor, layout or checksum verification.
    pub corrupt_frames: u64,
    pub dropped_no_buffer: u64,
    /// Wire messages that outgrew the accumulator.
    pub overflows: u64,
    pub resets: u64,
    pub peer_resets: u64,
    /// Frames from before the peer answered our reset request.
    pub ignored_during_reset: u64,
}
