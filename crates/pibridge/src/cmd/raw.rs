use pibridge_comm::PiBridge;

use crate::cmd::{parse_duration, parse_hex, RecvArgs, SendArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_bytes, OutputFormat};

pub fn recv(bridge: &PiBridge, args: RecvArgs, format: OutputFormat) -> CliResult<i32> {
    let mut buf = vec![0u8; args.len];
    let len = match args.timeout.as_deref() {
        Some(timeout) => bridge.recv_timeout(&mut buf, parse_duration(timeout)?),
        None => bridge.recv(&mut buf),
    }
    .map_err(|err| bridge_error("receive failed", err))?;
    print_bytes(&buf[..len], format);
    Ok(SUCCESS)
}

pub fn send(bridge: &PiBridge, args: SendArgs) -> CliResult<i32> {
    let data = parse_hex(&args.data)?;
    bridge
        .send(&data)
        .map_err(|err| bridge_error("send failed", err))?;
    Ok(SUCCESS)
}

pub fn clear(bridge: &PiBridge) -> CliResult<i32> {
    bridge
        .clear_fifo()
        .map_err(|err| bridge_error("clear failed", err))?;
    Ok(SUCCESS)
}
