use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arqlink_link::{ChannelState, ChannelStatus, Link, LinkConfig};
use arqlink_transport::{SerialSocket, SocketTransport};
use tracing::{info, warn};

use crate::cmd::{parse_duration, ListenArgs, POLL_INTERVAL};
use crate::exit::{link_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_chunk, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.to_config()?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let socket =
        SerialSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let transport = socket
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let mut link = open_link(transport, config.clone(), &args.channels)?;

        while running.load(Ordering::SeqCst) {
            link.poll(Instant::now());
            if link.check_transport().is_err() {
                info!("serial line closed by peer");
                break;
            }

            for &id in &args.channels {
                let mut channel = link
                    .channel(id)
                    .map_err(|err| link_error("channel lookup failed", err))?;
                keep_open(&mut channel, connect_timeout);

                let mut buf = [0u8; arqlink_frame::MAX_PAYLOAD];
                let read = channel.read_into(&mut buf);
                if read == 0 {
                    continue;
                }
                print_chunk(id, &buf[..read], format);
                printed = printed.saturating_add(1);

                if let Some(count) = args.count {
                    if printed >= count {
                        // Deliver the ack for what was just read.
                        link.poll(Instant::now());
                        return Ok(SUCCESS);
                    }
                }
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    Ok(SUCCESS)
}

fn open_link(
    transport: SocketTransport,
    config: LinkConfig,
    channels: &[u8],
) -> CliResult<Link<SocketTransport>> {
    let mut link =
        Link::new(transport, config).map_err(|err| link_error("invalid link config", err))?;
    for &id in channels {
        link.register(id)
            .map_err(|err| link_error("channel registration failed", err))?;
    }
    Ok(link)
}

/// Re-arm a channel that is not open, so the next peer connect succeeds.
fn keep_open(channel: &mut arqlink_link::Channel<'_, SocketTransport>, timeout: Duration) {
    match channel.state() {
        ChannelState::Disconnected | ChannelState::ConnectPending { .. } => {
            match channel.connect(timeout) {
                ChannelStatus::Success => info!(channel = channel.id(), "channel open"),
                ChannelStatus::TimedOut | ChannelStatus::PeerDisconnected => {
                    warn!(channel = channel.id(), "connect attempt ended; retrying");
                }
                ChannelStatus::Pending | ChannelStatus::Busy => {}
            }
        }
        ChannelState::Connected | ChannelState::DisconnectPending { .. } => {}
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
