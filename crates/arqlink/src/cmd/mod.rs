use std::path::PathBuf;
use std::time::{Duration, Instant};

use arqlink_link::{Link, LinkConfig};
use arqlink_transport::Transport;
use clap::{Args, Subcommand};

use crate::exit::{link_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

/// Pause between polls of an otherwise idle link.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept a serial line and print bytes received on its channels.
    Listen(ListenArgs),
    /// Open a channel, send a payload, and wait until it is acknowledged.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Protocol tuning shared by all link-running commands.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Frame buffers per link.
    #[arg(long, env = "ARQLINK_POOL_SIZE", default_value_t = 8)]
    pub pool_size: usize,
    /// Frames allowed in the transmit queue.
    #[arg(long, env = "ARQLINK_MAX_TX_QUEUE", default_value_t = 4)]
    pub max_tx_queue: usize,
    /// Channel id limit for this link.
    #[arg(long, env = "ARQLINK_MAX_CHANNELS", default_value_t = 8)]
    pub max_channels: u8,
    /// Wait before resending an unacknowledged frame (e.g. 500ms, 2s).
    #[arg(long, env = "ARQLINK_RETRANSMIT_TIMEOUT", default_value = "500ms")]
    pub retransmit_timeout: String,
    /// Resets after this many unanswered retransmissions.
    #[arg(long, env = "ARQLINK_MAX_RETRIES", default_value_t = 10, conflicts_with = "retry_forever")]
    pub max_retries: u32,
    /// Never give up on an unacknowledged frame.
    #[arg(long)]
    pub retry_forever: bool,
    /// How long a disconnect waits for the peer (e.g. 2s).
    #[arg(long, env = "ARQLINK_DISCONNECT_TIMEOUT", default_value = "2s")]
    pub disconnect_timeout: String,
    /// Skip the reset request normally sent on startup.
    #[arg(long)]
    pub no_announce: bool,
}

impl LinkArgs {
    pub fn to_config(&self) -> CliResult<LinkConfig> {
        Ok(LinkConfig {
            pool_size: self.pool_size,
            max_tx_queue: self.max_tx_queue,
            max_channels: self.max_channels,
            retransmit_timeout: parse_duration(&self.retransmit_timeout)?,
            max_retries: (!self.retry_forever).then_some(self.max_retries),
            disconnect_timeout: parse_duration(&self.disconnect_timeout)?,
            announce_reset: !self.no_announce,
        })
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Channels to open (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "0")]
    pub channels: Vec<u8>,
    /// Exit after printing N received chunks.
    #[arg(long)]
    pub count: Option<usize>,
    /// How long each connect attempt waits for the peer (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub connect_timeout: String,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel to send on.
    #[arg(long, short = 'c', default_value = "0")]
    pub channel: u8,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Overall time allowed for connect, delivery and disconnect (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Poll `link` until `done` holds, the deadline passes, or the line closes.
///
/// Returns `Ok(false)` on deadline.
pub fn poll_until<T, F>(link: &mut Link<T>, deadline: Instant, mut done: F) -> CliResult<bool>
where
    T: Transport,
    F: FnMut(&mut Link<T>) -> bool,
{
    loop {
        let now = Instant::now();
        link.poll(now);
        if done(link) {
            return Ok(true);
        }
        link.check_transport()
            .map_err(|err| link_error("serial line", err))?;
        if now >= deadline {
            return Ok(false);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
