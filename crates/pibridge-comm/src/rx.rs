use std::time::Duration;

use bytes::Bytes;
use pibridge_transport::{Transport, TransportError};

/// Receive-side failures.
#[derive(Debug, thiserror::Error)]
pub enum RxError {
    /// Nothing is pending.
    #[error("no data pending")]
    Empty,

    /// Nothing arrived before the timeout.
    #[error("no data within {0:?}")]
    TimedOut(Duration),

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<RxError> for crate::BridgeError {
    fn from(err: RxError) -> Self {
        match err {
            RxError::Empty => crate::BridgeError::TimedOut(Duration::ZERO),
            RxError::TimedOut(timeout) => crate::BridgeError::TimedOut(timeout),
            RxError::Transport(err) => crate::BridgeError::Transport(err),
        }
    }
}

/// Receive half of the medium: pending-byte reads and input hygiene.
///
/// Borrowed from the medium for the length of one transaction.
pub struct ReceiveBuffer<'a> {
    transport: &'a mut dyn Transport,
}

impl<'a> ReceiveBuffer<'a> {
    /// Wrap the receive side of `transport`.
    pub fn new(transport: &'a mut dyn Transport) -> Self {
        Self { transport }
    }

    /// Up to `max_len` pending bytes, without blocking.
    pub fn receive(&mut self, max_len: usize) -> Result<Bytes, RxError> {
        if max_len == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = vec![0u8; max_len];
        match self.transport.recv(&mut buf)? {
            0 => Err(RxError::Empty),
            n => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Wait until at least one byte is pending, then return up to `max_len`.
    ///
    /// `None` waits without a deadline. The result is whatever was there,
    /// not necessarily a whole frame.
    pub fn receive_with_timeout(
        &mut self,
        max_len: usize,
        timeout: Option<Duration>,
    ) -> Result<Bytes, RxError> {
        if max_len == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = vec![0u8; max_len];
        match self.transport.recv_timeout(&mut buf, timeout)? {
            0 => Err(RxError::TimedOut(timeout.unwrap_or_default())),
            n => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Discard all pending input, including a partly received frame.
    pub fn clear(&mut self) -> Result<(), RxError> {
        self.transport.discard_input()?;
        tracing::debug!(transport = self.transport.name(), "receive buffer cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pibridge_transport::link;

    #[test]
    fn receive_returns_pending_bytes() {
        let (mut transport, device) = link();
        device.send(&[1, 2, 3, 4]).unwrap();

        let mut rx = ReceiveBuffer::new(&mut transport);
        assert_eq!(&rx.receive(2).unwrap()[..], &[1, 2]);
        assert_eq!(&rx.receive(10).unwrap()[..], &[3, 4]);
        assert!(matches!(rx.receive(10), Err(RxError::Empty)));
    }

    #[test]
    fn clear_then_receive_is_empty() {
        let (mut transport, device) = link();
        device.send(&[0x49, 0x05, 0x10]).unwrap();

        let mut rx = ReceiveBuffer::new(&mut transport);
        rx.clear().unwrap();
        assert!(matches!(rx.receive(16), Err(RxError::Empty)));
    }

    #[test]
    fn zero_length_does_not_touch_transport() {
        let (mut transport, device) = link();
        device.send(&[9]).unwrap();

        let mut rx = ReceiveBuffer::new(&mut transport);
        assert!(rx.receive(0).unwrap().is_empty());
        assert!(rx
            .receive_with_timeout(0, Some(Duration::from_millis(1)))
            .unwrap()
            .is_empty());
        assert_eq!(&rx.receive(1).unwrap()[..], &[9]);
    }

    #[test]
    fn receive_with_timeout_times_out() {
        let (mut transport, _device) = link();
        let mut rx = ReceiveBuffer::new(&mut transport);
        let timeout = Duration::from_millis(20);
        let err = rx.receive_with_timeout(8, Some(timeout)).unwrap_err();
        assert!(matches!(err, RxError::TimedOut(t) if t == timeout));
    }

    #[test]
    fn receive_with_timeout_wakes_on_data() {
        let (mut transport, device) = link();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            device.send(&[7, 8]).unwrap();
            device
        });

        let mut rx = ReceiveBuffer::new(&mut transport);
        let bytes = rx
            .receive_with_timeout(8, Some(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(&bytes[..], &[7, 8]);
        drop(sender.join().unwrap());
    }

    #[test]
    fn closed_link_is_a_transport_error() {
        let (mut transport, device) = link();
        drop(device);
        let mut rx = ReceiveBuffer::new(&mut transport);
        assert!(matches!(
            rx.receive(4),
            Err(RxError::Transport(TransportError::Closed))
        ));
    }
}
