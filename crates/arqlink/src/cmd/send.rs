use std::fs;
use std::time::{Duration, Instant};

use arqlink_link::{ChannelStatus, Link, LinkError};
use arqlink_transport::{SerialSocket, Transport};
use tracing::{debug, warn};

use crate::cmd::{parse_duration, poll_until, SendArgs};
use crate::exit::{link_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.to_config()?;
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let transport =
        SerialSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))?;
    let mut link =
        Link::new(transport, config).map_err(|err| link_error("invalid link config", err))?;
    link.register(args.channel)
        .map_err(|err| link_error("channel registration failed", err))?;

    let deadline = Instant::now() + timeout;
    if !open_channel(&mut link, args.channel, deadline)? {
        return Err(CliError::timeout(format!(
            "channel {} did not open within {timeout:?}",
            args.channel
        )));
    }

    deliver(&mut link, args.channel, &payload, deadline)?;
    close_channel(&mut link, args.channel, deadline);

    print_stats(args.channel, payload.len(), link.stats(), format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

fn open_channel<T: Transport>(link: &mut Link<T>, id: u8, deadline: Instant) -> CliResult<bool> {
    poll_until(link, deadline, |link| {
        let remaining = deadline
            .saturating_duration_since(link.now())
            .max(Duration::from_millis(1));
        let Ok(mut channel) = link.channel(id) else {
            return false;
        };
        match channel.connect(remaining) {
            ChannelStatus::Success => true,
            ChannelStatus::TimedOut | ChannelStatus::PeerDisconnected => {
                debug!(channel = id, "connect attempt ended; retrying");
                false
            }
            ChannelStatus::Pending | ChannelStatus::Busy => false,
        }
    })
}

/// Write the whole payload and wait until the peer has acknowledged all of it.
fn deliver<T: Transport>(
    link: &mut Link<T>,
    id: u8,
    payload: &[u8],
    deadline: Instant,
) -> CliResult<()> {
    let mut offset = 0;
    let mut flushed = false;
    let mut failure: Option<LinkError> = None;

    let finished = poll_until(link, deadline, |link| {
        let mut channel = match link.channel(id) {
            Ok(channel) => channel,
            Err(err) => {
                failure = Some(err);
                return true;
            }
        };
        if offset < payload.len() {
            match channel.write_bytes(&payload[offset..]) {
                Ok(written) => offset += written,
                Err(err) if err.is_backpressure() => {}
                Err(err) => {
                    failure = Some(err);
                    return true;
                }
            }
        }
        if offset == payload.len() && !flushed {
            match channel.flush() {
                Ok(()) => flushed = true,
                Err(err) if err.is_backpressure() => {}
                Err(err) => {
                    failure = Some(err);
                    return true;
                }
            }
        }
        flushed && link.is_idle()
    })?;

    if let Some(err) = failure {
        return Err(link_error("send failed", err));
    }
    if !finished {
        return Err(CliError::timeout(format!(
            "{} of {} bytes queued, delivery not acknowledged in time",
            offset,
            payload.len()
        )));
    }
    Ok(())
}

fn close_channel<T: Transport>(link: &mut Link<T>, id: u8, deadline: Instant) {
    let closed = poll_until(link, deadline, |link| {
        link.channel(id)
            .map(|mut channel| channel.disconnect() == ChannelStatus::Success)
            .unwrap_or(true)
    });
    match closed {
        Ok(true) => debug!(channel = id, "channel closed"),
        Ok(false) => warn!(channel = id, "peer did not confirm disconnect"),
        Err(err) => warn!(channel = id, error = %err, "serial line closed during disconnect"),
    }
}
