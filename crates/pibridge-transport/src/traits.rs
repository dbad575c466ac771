use std::time::Duration;

use crate::error::Result;

/// A raw, byte-oriented bus channel.
///
/// This is the collaborator the transaction core is built on. It has no
/// notion of frames: it sends bytes, hands out whatever bytes have arrived,
/// and can throw pending input away.
pub trait Transport: Send {
    /// Write all of `data` to the medium and wait until it has left the
    /// output queue.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Copy pending input into `buf` without blocking.
    ///
    /// Returns `Ok(0)` when nothing is pending.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Block until at least one byte is pending or `timeout` elapses, then
    /// copy up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` on timeout. `None` waits without a deadline.
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize>;

    /// Drop all pending input.
    fn discard_input(&mut self) -> Result<()>;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).recv(buf)
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        (**self).recv_timeout(buf, timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
