use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use arqlink_link::LinkStats;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput {
    channel: u8,
    size: usize,
    payload: String,
    timestamp: String,
}

/// Print bytes read from a channel.
pub fn print_chunk(channel: u8, data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ChunkOutput {
                channel,
                size: data.len(),
                payload: payload_preview(data),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    channel.to_string(),
                    data.len().to_string(),
                    payload_preview(data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} size={} payload={}",
                channel,
                data.len(),
                payload_preview(data)
            );
        }
        OutputFormat::Raw => print_raw(data),
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    channel: u8,
    bytes_sent: usize,
    stats: &'a LinkStats,
}

/// Print the counters of a finished send.
pub fn print_stats(channel: u8, bytes_sent: usize, stats: &LinkStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                channel,
                bytes_sent,
                stats,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            table.add_row(vec!["channel".to_string(), channel.to_string()]);
            table.add_row(vec!["bytes_sent".to_string(), bytes_sent.to_string()]);
            for (name, value) in stat_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let counters = stat_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("channel={channel} bytes_sent={bytes_sent} {counters}");
        }
    }
}

fn stat_rows(stats: &LinkStats) -> [(&'static str, u64); 13] {
    [
        ("frames_sent", stats.frames_sent),
        ("retransmissions", stats.retransmissions),
        ("acks_sent", stats.acks_sent),
        ("acks_received", stats.acks_received),
        ("frames_received", stats.frames_received),
        ("frames_delivered", stats.frames_delivered),
        ("duplicates", stats.duplicates),
        ("corrupt_frames", stats.corrupt_frames),
        ("dropped_no_buffer", stats.dropped_no_buffer),
        ("overflows", stats.overflows),
        ("resets", stats.resets),
        ("peer_resets", stats.peer_resets),
        ("ignored_during_reset", stats.ignored_during_reset),
    ]
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
