mod common;

use std::time::Duration;

use arqlink_link::{ChannelState, ChannelStatus, LinkConfig, LinkError};
use common::{read_all, Pair, CONNECT_TIMEOUT};

#[test]
fn simultaneous_connect_opens_both_sides() {
    let mut pair = Pair::new();
    pair.register_both(2);

    assert_eq!(
        pair.a.channel(2).expect("a channel").connect(CONNECT_TIMEOUT),
        ChannelStatus::Pending
    );
    assert_eq!(
        pair.b.channel(2).expect("b channel").connect(CONNECT_TIMEOUT),
        ChannelStatus::Pending
    );
    pair.settle();

    assert_eq!(
        pair.a.channel(2).expect("a channel").connect(CONNECT_TIMEOUT),
        ChannelStatus::Success
    );
    assert_eq!(
        pair.b.channel(2).expect("b channel").connect(CONNECT_TIMEOUT),
        ChannelStatus::Success
    );
}

#[test]
fn connect_times_out_without_peer() {
    let mut pair = Pair::new();
    pair.register_both(0);
    let timeout = Duration::from_secs(1);

    assert_eq!(
        pair.a.channel(0).expect("a channel").connect(timeout),
        ChannelStatus::Pending
    );
    pair.settle();
    pair.advance(timeout);
    pair.settle();

    let mut channel = pair.a.channel(0).expect("a channel");
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(channel.connect(timeout), ChannelStatus::TimedOut);

    // The cancel reached b, so b does not think a is still waiting.
    assert_eq!(
        pair.b.channel(0).expect("b channel").connect(timeout),
        ChannelStatus::Pending
    );
}

#[test]
fn connect_to_unregistered_channel_is_refused() {
    let mut pair = Pair::new();
    pair.a.register(4).expect("a should register");

    assert_eq!(
        pair.a.channel(4).expect("a channel").connect(CONNECT_TIMEOUT),
        ChannelStatus::Pending
    );
    pair.settle();

    assert!(!pair.b.is_registered(4));
    let mut channel = pair.a.channel(4).expect("a channel");
    assert_eq!(channel.connect(CONNECT_TIMEOUT), ChannelStatus::PeerDisconnected);
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(pair.a.is_idle());
}

#[test]
fn data_to_closed_channel_is_refused() {
    let mut pair = Pair::new();
    pair.register_both(1);
    pair.open(1);

    // b drops the channel without telling a.
    pair.b.deregister(1).expect("b should deregister");
    pair.b.register(1).expect("b should register again");

    pair.a.channel(1).expect("a channel").write(b'x').expect("a write");
    pair.a.channel(1).expect("a channel").flush().expect("a flush");
    pair.settle();

    assert!(read_all(&mut pair.b, 1).is_empty());
    assert_eq!(
        pair.a.channel(1).expect("a channel").state(),
        ChannelState::Disconnected
    );
    assert!(pair.a.is_idle());
    assert!(pair.b.is_idle());
}

#[test]
fn one_sided_disconnect_is_answered() {
    let mut pair = Pair::new();
    pair.register_both(0);
    pair.open(0);

    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Pending
    );
    pair.settle();

    assert_eq!(
        pair.b.channel(0).expect("b channel").state(),
        ChannelState::Disconnected
    );
    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Success
    );
}

#[test]
fn simultaneous_disconnect_completes_both_sides() {
    let mut pair = Pair::new();
    pair.register_both(0);
    pair.open(0);

    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Pending
    );
    assert_eq!(
        pair.b.channel(0).expect("b channel").disconnect(),
        ChannelStatus::Pending
    );
    pair.settle();

    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Success
    );
    assert_eq!(
        pair.b.channel(0).expect("b channel").disconnect(),
        ChannelStatus::Success
    );
    assert!(pair.a.is_idle());
    assert!(pair.b.is_idle());
}

#[test]
fn disconnect_flushes_pending_bytes_first() {
    let mut pair = Pair::new();
    pair.register_both(0);
    pair.open(0);

    pair.a.channel(0).expect("a channel").write_bytes(b"bye").expect("a write");
    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Pending
    );
    pair.settle();
    assert_eq!(read_all(&mut pair.b, 0), b"bye");
    pair.settle();

    assert_eq!(
        pair.b.channel(0).expect("b channel").state(),
        ChannelState::Disconnected
    );
    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Success
    );
}

#[test]
fn disconnect_gives_up_after_timeout() {
    let mut pair = Pair::with_configs(
        LinkConfig {
            disconnect_timeout: Duration::from_secs(1),
            ..LinkConfig::default()
        },
        LinkConfig::default(),
    );
    pair.register_both(0);
    pair.open(0);

    assert_eq!(
        pair.a.channel(0).expect("a channel").disconnect(),
        ChannelStatus::Pending
    );
    pair.take_from_a();
    pair.advance(Duration::from_secs(1));

    assert_eq!(
        pair.a.channel(0).expect("a channel").state(),
        ChannelState::Disconnected
    );
}

#[test]
fn channels_are_independent() {
    let mut pair = Pair::new();
    pair.register_both(0);
    pair.register_both(1);
    pair.open(0);
    pair.open(1);

    pair.write_a(0, b"zero");
    pair.settle();
    pair.write_a(1, b"one");
    pair.settle();

    // Channel 1 waits behind the unread frame on channel 0.
    assert!(read_all(&mut pair.b, 1).is_empty());
    assert_eq!(read_all(&mut pair.b, 0), b"zero");
    pair.settle();
    assert_eq!(read_all(&mut pair.b, 1), b"one");

    let mut channel = pair.b.channel(0).expect("b channel");
    assert_eq!(channel.peek(), None);
    assert_eq!(channel.available(), 0);
}

#[test]
fn peek_and_read_into() {
    let mut pair = Pair::new();
    pair.register_both(0);
    pair.open(0);
    pair.write_a(0, b"peekable");
    pair.settle();

    let mut channel = pair.b.channel(0).expect("b channel");
    assert_eq!(channel.peek(), Some(b'p'));
    assert_eq!(channel.available(), 8);

    let mut buf = [0u8; 4];
    assert_eq!(channel.read_into(&mut buf), 4);
    assert_eq!(&buf, b"peek");
    assert_eq!(channel.available(), 4);
    assert_eq!(channel.read_into(&mut buf), 4);
    assert_eq!(&buf, b"able");
    assert_eq!(channel.read_into(&mut buf), 0);
}

#[test]
fn write_before_connect_fails() {
    let mut pair = Pair::new();
    pair.register_both(0);

    let err = pair
        .a
        .channel(0)
        .expect("a channel")
        .write(1)
        .expect_err("write should fail");
    assert!(matches!(err, LinkError::NotConnected(0)));
    assert!(matches!(pair.a.channel(7), Err(LinkError::UnknownChannel(7))));
    assert!(matches!(
        pair.a.register(8),
        Err(LinkError::ChannelOutOfRange { id: 8, max: 8 })
    ));
}
