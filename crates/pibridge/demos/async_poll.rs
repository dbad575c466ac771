//! Poll a simulated module from async tasks.
//!
//! Run with:
//!   cargo run -p pibridge --example async-poll --features async

use std::time::Duration;

use pibridge::frame::{decode_frame, encode, Frame};
use pibridge::transport::link;
use pibridge::{AsyncPiBridge, BridgeConfig, PiBridge, Target};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (transport, device) = link();
    let bridge = AsyncPiBridge::new(PiBridge::new(transport, BridgeConfig::default())?);

    // Gateway destination 0x10 echoes the payload of command 0x0200.
    let module = std::thread::spawn(move || {
        let request_len = Frame::gateway(0x10, 0x0200, vec![0]).wire_size();
        while let Ok(Some(bytes)) = device.recv_exact(request_len, Duration::from_secs(1)) {
            let Ok(request) = decode_frame(&bytes) else {
                continue;
            };
            let reply = Frame::gateway(request.address, request.command, request.payload);
            let Ok(bytes) = encode(&reply) else { break };
            if device.send(&bytes).is_err() {
                break;
            }
        }
    });

    let mut tasks = Vec::new();
    for n in 0..4u8 {
        let bridge = bridge.clone();
        tasks.push(tokio::spawn(async move {
            bridge
                .request(Target::Gateway { destination: 0x10 }, 0x0200, vec![n], 8, None)
                .await
        }));
    }
    for task in tasks {
        match task.await? {
            Ok(response) => println!("reply {:02x?}", &response.payload[..]),
            Err(err) => println!("request failed: {err}"),
        }
    }

    println!("{:?}", bridge.stats());
    drop(bridge);
    let _ = module.join();
    Ok(())
}
