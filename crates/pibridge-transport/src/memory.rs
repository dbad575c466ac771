//! In-memory bus link.
//!
//! [`link`] returns the two ends of a simulated bus segment: the controller
//! end implements [`Transport`]; the device end plays the part of the
//! attached modules. Bytes written on one end are queued for the other.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::queue::ReceiveQueue;
use crate::traits::Transport;

/// Create a connected controller/device pair.
pub fn link() -> (MemoryTransport, MemoryDevice) {
    let to_controller = Arc::new(ReceiveQueue::new());
    let to_device = Arc::new(ReceiveQueue::new());

    let controller = MemoryTransport {
        rx: Arc::clone(&to_controller),
        tx: Arc::clone(&to_device),
    };
    let device = MemoryDevice {
        rx: to_device,
        tx: to_controller,
    };
    (controller, device)
}

/// Controller end of an in-memory bus segment.
#[derive(Debug)]
pub struct MemoryTransport {
    rx: Arc<ReceiveQueue>,
    tx: Arc<ReceiveQueue>,
}

impl Transport for MemoryTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.tx.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx.push(data);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.rx.pop_into(buf)
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        self.rx.wait_pop_into(buf, timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.rx.close();
        self.tx.close();
    }
}

/// Device end of an in-memory bus segment.
#[derive(Debug)]
pub struct MemoryDevice {
    rx: Arc<ReceiveQueue>,
    tx: Arc<ReceiveQueue>,
}

impl MemoryDevice {
    /// Put bytes on the wire towards the controller.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        if self.tx.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx.push(data);
        Ok(())
    }

    /// Wait for bytes written by the controller. Returns `Ok(0)` on timeout.
    pub fn recv_timeout(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        self.rx.wait_pop_into(buf, timeout)
    }

    /// Collect exactly `len` bytes written by the controller.
    ///
    /// Returns `Ok(None)` when `timeout` elapses first; bytes gathered so far
    /// are lost in that case.
    pub fn recv_exact(&self, len: usize, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = std::time::Instant::now() + timeout;
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let mut chunk = vec![0u8; len - out.len()];
            let n = self.rx.wait_pop_into(&mut chunk, Some(remaining))?;
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(Some(out))
    }

    /// Bytes sent towards the controller that it has not consumed yet.
    pub fn undelivered(&self) -> usize {
        self.tx.len()
    }
}

impl Drop for MemoryDevice {
    fn drop(&mut self) {
        self.rx.close();
        self.tx.close();
    }
}
