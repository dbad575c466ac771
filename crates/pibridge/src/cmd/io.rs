use pibridge_comm::{PiBridge, Target};

use crate::cmd::{parse_hex, IoArgs, SendIoArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(bridge: &PiBridge, args: IoArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_hex(&args.data)?;
    let target = Target::LocalIo {
        address: args.address,
    };
    let response = bridge
        .request(target, u16::from(args.command), &payload, args.max_len, None)
        .map_err(|err| bridge_error("io request failed", err))?;
    print_response(target, &response, format);
    Ok(SUCCESS)
}

pub fn run_send(bridge: &PiBridge, args: SendIoArgs) -> CliResult<i32> {
    let payload = parse_hex(&args.data)?;
    bridge
        .req_send_io(args.address, args.command, &payload)
        .map_err(|err| bridge_error("io send failed", err))?;
    Ok(SUCCESS)
}
