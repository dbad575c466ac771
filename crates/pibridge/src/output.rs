use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pibridge_comm::{Response, StatsSnapshot, Target};
use pibridge_frame::Frame;
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
struct ResponseOutput<'a> {
    domain: &'a str,
    address: u8,
    command: u16,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct BytesOutput {
    size: usize,
    data: String,
    timestamp: String,
}

pub fn print_response(target: Target, response: &Response, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                domain: target.domain().name(),
                address: target.address(),
                command: response.command,
                payload_size: response.payload.len(),
                payload: hex::encode(&response.payload),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table();
            table
                .set_header(vec!["DOMAIN", "ADDRESS", "COMMAND", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    target.domain().name().to_string(),
                    target.address().to_string(),
                    format!("{:#06x}", response.command),
                    response.payload.len().to_string(),
                    hex_preview(&response.payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} address={} command={:#06x} size={} payload={}",
                target.domain(),
                target.address(),
                response.command,
                response.payload.len(),
                hex_preview(&response.payload)
            );
        }
        OutputFormat::Raw => print_raw(&response.payload),
    }
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                domain: frame.domain.name(),
                address: frame.address,
                command: frame.command,
                payload_size: frame.payload.len(),
                payload: hex::encode(&frame.payload),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "{:<8} address={:<3} command={:#06x} size={:<3} payload={}",
                frame.domain.name(),
                frame.address,
                frame.command,
                frame.payload.len(),
                hex_preview(&frame.payload)
            );
        }
        OutputFormat::Raw => print_raw(&frame.payload),
    }
}

pub fn print_bytes(data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = BytesOutput {
                size: data.len(),
                data: hex::encode(data),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table();
            table
                .set_header(vec!["SIZE", "DATA"])
                .add_row(vec![data.len().to_string(), hex_preview(data)]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("size={} data={}", data.len(), hex_preview(data)),
        OutputFormat::Raw => print_raw(data),
    }
}

pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let mut table = new_table();
            table
                .set_header(vec![
                    "REQUESTS", "SENDS", "COMPLETED", "TIMEOUTS", "FAILURES", "NOISE",
                ])
                .add_row(vec![
                    stats.requests.to_string(),
                    stats.sends.to_string(),
                    stats.completed.to_string(),
                    stats.timeouts.to_string(),
                    stats.failures.to_string(),
                    stats.noise_frames.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "requests={} sends={} completed={} timeouts={} failures={} noise={}",
                stats.requests,
                stats.sends,
                stats.completed,
                stats.timeouts,
                stats.failures,
                stats.noise_frames
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Space-separated hex, `-` for an empty payload.
fn hex_preview(data: &[u8]) -> String {
    if data.is_empty() {
        return "-".to_string();
    }
    data.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
