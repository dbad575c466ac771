use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use pibridge_comm::{BridgeConfig, PiBridge};

use crate::exit::{bridge_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_stats, OutputFormat};

pub mod gate;
pub mod io;
pub mod monitor;
pub mod raw;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Request/response to a local I/O module.
    Io(IoArgs),
    /// Fire-and-forget command to a local I/O module.
    SendIo(SendIoArgs),
    /// Request/response to a gateway module.
    Gate(GateArgs),
    /// Fire-and-forget command to a gateway module.
    SendGate(SendGateArgs),
    /// Read raw bytes from the bus.
    Recv(RecvArgs),
    /// Write raw bytes to the bus.
    Send(SendArgs),
    /// Discard pending input.
    Clear,
    /// Decode and print frames seen on the bus.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, bus: &BusArgs, format: OutputFormat) -> CliResult<i32> {
    let bridge = match command {
        Command::Version(args) => return version::run(args),
        _ => open_bridge(bus)?,
    };

    let code = match command {
        Command::Io(args) => io::run(&bridge, args, format),
        Command::SendIo(args) => io::run_send(&bridge, args),
        Command::Gate(args) => gate::run(&bridge, args, format),
        Command::SendGate(args) => gate::run_send(&bridge, args),
        Command::Recv(args) => raw::recv(&bridge, args, format),
        Command::Send(args) => raw::send(&bridge, args),
        Command::Clear => raw::clear(&bridge),
        Command::Monitor(args) => monitor::run(&bridge, args, format),
        Command::Version(_) => Ok(SUCCESS),
    }?;

    if bus.stats {
        print_stats(&bridge.stats(), format);
    }
    Ok(code)
}

/// Where the bus is and how to configure it.
#[derive(Args, Debug, Clone, Default)]
pub struct BusArgs {
    /// JSON bridge configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
    /// Serial device (overrides the config file).
    #[arg(long, value_name = "PATH", env = "PIBRIDGE_DEVICE", global = true)]
    pub device: Option<PathBuf>,
    /// Line speed in baud (overrides the config file).
    #[arg(long, value_name = "BAUD", env = "PIBRIDGE_BAUD", global = true)]
    pub baud: Option<u32>,
    /// Print transaction counters after the command.
    #[arg(long, global = true)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct IoArgs {
    /// Module address.
    #[arg(value_parser = parse_u8)]
    pub address: u8,
    /// Command byte.
    #[arg(value_parser = parse_u8)]
    pub command: u8,
    /// Hex payload.
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,
    /// Largest reply payload accepted.
    #[arg(long, default_value_t = 255)]
    pub max_len: usize,
}

#[derive(Args, Debug)]
pub struct SendIoArgs {
    /// Module address.
    #[arg(value_parser = parse_u8)]
    pub address: u8,
    /// Command byte.
    #[arg(value_parser = parse_u8)]
    pub command: u8,
    /// Hex payload.
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,
}

#[derive(Args, Debug)]
pub struct GateArgs {
    /// Gateway destination.
    #[arg(value_parser = parse_u8)]
    pub destination: u8,
    /// 16-bit command.
    #[arg(value_parser = parse_u16)]
    pub command: u16,
    /// Hex payload.
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,
    /// Largest reply payload accepted.
    #[arg(long, default_value_t = 255)]
    pub max_len: usize,
    /// Reply timeout (e.g. 500ms, 2s). Default: gateway timeout from config.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendGateArgs {
    /// Gateway destination.
    #[arg(value_parser = parse_u8)]
    pub destination: u8,
    /// 16-bit command.
    #[arg(value_parser = parse_u16)]
    pub command: u16,
    /// Hex payload.
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    /// Number of bytes to collect.
    #[arg(long)]
    pub len: usize,
    /// Give up after this long (e.g. 500ms, 2s). Default: wait until full.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Hex bytes to write.
    pub data: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn open_bridge(bus: &BusArgs) -> CliResult<PiBridge> {
    let mut config = match &bus.config {
        Some(path) => BridgeConfig::from_json_file(path)
            .map_err(|err| bridge_error("config load failed", err))?,
        None => BridgeConfig::default(),
    };
    if let Some(device) = &bus.device {
        config.serial.device = device.clone();
    }
    if let Some(baud) = bus.baud {
        config.serial.baud_rate = baud;
    }
    tracing::debug!(device = ?config.serial.device, baud = config.serial.baud_rate, "opening bridge");

    let serial = config.serial.clone();
    PiBridge::open_serial(&serial, config).map_err(|err| bridge_error("open failed", err))
}

/// Decimal or `0x`-prefixed hex byte.
pub fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_number(input)?;
    u8::try_from(value).map_err(|_| format!("{input} does not fit in one byte"))
}

/// Decimal or `0x`-prefixed hex 16-bit value.
pub fn parse_u16(input: &str) -> Result<u16, String> {
    let value = parse_number(input)?;
    u16::try_from(value).map_err(|_| format!("{input} does not fit in two bytes"))
}

fn parse_number(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input}"))
}

/// Hex payload; whitespace, `:` and `_` separators and a `0x` prefix are
/// ignored.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let input = input.trim();
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '_')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::new(USAGE, format!("invalid hex payload: {err}")))
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
        (input, "ms")
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
