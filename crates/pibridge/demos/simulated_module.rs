//! Drive the bridge against a simulated bus segment.
//!
//! A thread plays one local I/O module at address 31 and one gateway
//! destination 0x20; four caller threads share the bridge.
//!
//! Run with:
//!   cargo run -p pibridge --example simulated-module

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pibridge::frame::{decode_frame, encode, Domain, Frame, GATEWAY_MARKER};
use pibridge::transport::{link, MemoryDevice};
use pibridge::{BridgeConfig, PiBridge};

const WAIT: Duration = Duration::from_secs(1);

fn read_request(device: &MemoryDevice) -> Option<Frame> {
    let mut bytes = device.recv_exact(4, WAIT).ok()??;
    if bytes[0] == GATEWAY_MARKER {
        bytes.extend(device.recv_exact(1, WAIT).ok()??);
    }
    let rest = usize::from(bytes[bytes.len() - 1]) + 1;
    bytes.extend(device.recv_exact(rest, WAIT).ok()??);
    decode_frame(&bytes).ok()
}

/// Answer every request with a running counter; stay silent for unknown
/// modules so their callers time out.
fn run_module(device: MemoryDevice) {
    let mut counter = 0u8;
    while let Some(request) = read_request(&device) {
        let known = matches!(
            (request.domain, request.address),
            (Domain::LocalIo, 31) | (Domain::Gateway, 0x20)
        );
        if !known {
            continue;
        }
        counter = counter.wrapping_add(1);
        let reply = Frame::new(request.domain, request.address, request.command, vec![counter]);
        let Ok(bytes) = encode(&reply) else { break };
        if device.send(&bytes).is_err() {
            break;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (transport, device) = link();
    let config = BridgeConfig::default().with_io_timeout(Duration::from_millis(50));
    let bridge = Arc::new(PiBridge::new(transport, config)?);
    let module = thread::spawn(move || run_module(device));

    let callers: Vec<_> = (0..4u8)
        .map(|id| {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let mut reply = [0u8; 8];
                for _ in 0..3 {
                    match bridge.req_io(31, 0x01, &[id], &mut reply) {
                        Ok(len) => println!("caller {id}: io reply {:02x?}", &reply[..len]),
                        Err(err) => println!("caller {id}: io failed: {err}"),
                    }
                }
                match bridge.req_gate(0x20, 0x0301, &[], &mut reply) {
                    Ok(len) => println!("caller {id}: gate reply {:02x?}", &reply[..len]),
                    Err(err) => println!("caller {id}: gate failed: {err}"),
                }
            })
        })
        .collect();
    for caller in callers {
        let _ = caller.join();
    }

    let mut reply = [0u8; 8];
    match bridge.req_io(12, 0x01, &[], &mut reply) {
        Err(err) if err.is_timeout() => println!("address 12: {err}"),
        other => println!("address 12: unexpected {other:?}"),
    }

    println!("{:?}", bridge.stats());
    drop(bridge);
    let _ = module.join();
    Ok(())
}
