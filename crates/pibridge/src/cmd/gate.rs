use pibridge_comm::{PiBridge, Target};

use crate::cmd::{parse_duration, parse_hex, GateArgs, SendGateArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(bridge: &PiBridge, args: GateArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_hex(&args.data)?;
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let target = Target::Gateway {
        destination: args.destination,
    };
    let response = bridge
        .request(target, args.command, &payload, args.max_len, timeout)
        .map_err(|err| bridge_error("gate request failed", err))?;
    print_response(target, &response, format);
    Ok(SUCCESS)
}

pub fn run_send(bridge: &PiBridge, args: SendGateArgs) -> CliResult<i32> {
    let payload = parse_hex(&args.data)?;
    bridge
        .req_send_gate(args.destination, args.command, &payload)
        .map_err(|err| bridge_error("gate send failed", err))?;
    Ok(SUCCESS)
}
