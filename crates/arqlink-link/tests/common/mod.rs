#![allow(dead_code)]

use std::time::{Duration, Instant};

use arqlink_frame::{armor, dearmor, decode_frame, ArqMessage, ChannelMessage, Frame, EOM, SOM};
use arqlink_link::{ChannelStatus, Link, LinkConfig};
use arqlink_transport::MemoryTransport;
use bytes::{BufMut, BytesMut};

pub const RTO: Duration = Duration::from_millis(500);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub type TestLink = Link<MemoryTransport>;

/// Two links joined back to back through in-memory transports.
///
/// Bytes only move on `step`, so a test can intercept, drop or corrupt
/// messages in between.
pub struct Pair {
    pub a: TestLink,
    pub b: TestLink,
    pub now: Instant,
}

impl Pair {
    pub fn new() -> Self {
        Self::with_configs(LinkConfig::default(), LinkConfig::default())
    }

    pub fn with_configs(a: LinkConfig, b: LinkConfig) -> Self {
        let mut pair = Self::unsettled(a, b);
        pair.settle();
        pair
    }

    /// Neither link has polled yet, so the startup resets are still to come.
    pub fn unsettled(a: LinkConfig, b: LinkConfig) -> Self {
        let a = Link::new(MemoryTransport::new(), a).expect("config a should be valid");
        let b = Link::new(MemoryTransport::new(), b).expect("config b should be valid");
        Self {
            a,
            b,
            now: Instant::now(),
        }
    }

    pub fn poll(&mut self) {
        self.a.poll(self.now);
        self.b.poll(self.now);
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
        self.poll();
    }

    pub fn take_from_a(&mut self) -> Vec<Vec<u8>> {
        split_messages(&self.a.transport_mut().take_sent())
    }

    pub fn take_from_b(&mut self) -> Vec<Vec<u8>> {
        split_messages(&self.b.transport_mut().take_sent())
    }

    /// Move everything sent so far to the other side, then poll both.
    pub fn step(&mut self) {
        let to_b = self.a.transport_mut().take_sent();
        let to_a = self.b.transport_mut().take_sent();
        self.b.transport_mut().inject(&to_b);
        self.a.transport_mut().inject(&to_a);
        self.poll();
    }

    /// Step until neither side has anything left to say.
    pub fn settle(&mut self) {
        self.poll();
        for _ in 0..64 {
            if self.a.transport().sent().is_empty() && self.b.transport().sent().is_empty() {
                return;
            }
            self.step();
        }
        panic!("links did not go quiet");
    }

    pub fn register_both(&mut self, id: u8) {
        self.a.register(id).expect("a should register");
        self.b.register(id).expect("b should register");
    }

    /// Connect `id` from both ends, `a` first.
    pub fn open(&mut self, id: u8) {
        let status = self.a.channel(id).expect("a channel").connect(CONNECT_TIMEOUT);
        assert_eq!(status, ChannelStatus::Pending);
        self.settle();

        let status = self.b.channel(id).expect("b channel").connect(CONNECT_TIMEOUT);
        assert_eq!(status, ChannelStatus::Success);
        self.settle();

        let status = self.a.channel(id).expect("a channel").connect(CONNECT_TIMEOUT);
        assert_eq!(status, ChannelStatus::Success);
    }

    pub fn write_a(&mut self, id: u8, data: &[u8]) {
        let mut channel = self.a.channel(id).expect("a channel");
        let written = channel.write_bytes(data).expect("write should succeed");
        assert_eq!(written, data.len());
        channel.flush().expect("flush should succeed");
    }
}

pub fn read_all(link: &mut TestLink, id: u8) -> Vec<u8> {
    let mut channel = link.channel(id).expect("channel should be registered");
    std::iter::from_fn(|| channel.read()).collect()
}

pub fn split_messages(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes
        .split_inclusive(|&byte| byte == EOM)
        .map(<[u8]>::to_vec)
        .collect()
}

pub fn decode(message: &[u8]) -> Option<Frame> {
    let body = message.strip_prefix(&[SOM])?.strip_suffix(&[EOM])?;
    decode_frame(&dearmor(body).ok()?).ok()
}

pub fn is_payload(message: &[u8]) -> bool {
    decode(message).is_some_and(|frame| {
        matches!(frame.arq, ArqMessage::Data(_))
            && frame.message == ChannelMessage::NoOp
            && !frame.is_empty()
    })
}

pub fn is_ack(message: &[u8]) -> bool {
    decode(message).is_some_and(|frame| {
        matches!(frame.arq, ArqMessage::Ack(_)) && frame.message != ChannelMessage::Reset
    })
}

/// Re-armor a wire message with one checksum bit inverted.
pub fn flip_checksum_bit(message: &[u8]) -> Vec<u8> {
    let body = &message[1..message.len() - 1];
    let mut raw = dearmor(body).expect("message should dearmor");
    raw[2] ^= 0x01;

    let mut out = BytesMut::new();
    out.put_u8(SOM);
    armor(&raw, &mut out);
    out.put_u8(EOM);
    out.to_vec()
}
