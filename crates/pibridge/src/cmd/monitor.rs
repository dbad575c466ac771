use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use pibridge_comm::{BridgeError, PiBridge};
use pibridge_frame::decode_next;

use crate::cmd::MonitorArgs;
use crate::exit::{bridge_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

/// How often the read loop checks for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(bridge: &PiBridge, args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut session = bridge.session();
    let mut pending = BytesMut::new();
    let mut chunk = [0u8; 256];
    let mut printed = 0usize;
    let mut skipped = 0usize;

    while running.load(Ordering::SeqCst) {
        match session.recv_timeout(&mut chunk, POLL_INTERVAL) {
            Ok(n) => pending.extend_from_slice(&chunk[..n]),
            Err(BridgeError::TimedOut(_)) => continue,
            Err(err) => return Err(bridge_error("receive failed", err)),
        }

        loop {
            match decode_next(&mut pending) {
                Ok(Some(frame)) => {
                    print_frame(&frame, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        return Ok(SUCCESS);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping byte");
                    skipped = skipped.saturating_add(1);
                    pending.advance(1);
                }
            }
        }
    }

    tracing::info!(printed, skipped, "monitor stopped");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
