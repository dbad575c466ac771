//! Caller-facing bridge.
//!
//! [`PiBridge`] owns one medium and turns it into blocking calls that are
//! safe to make from any number of threads. Every call queues on the bus
//! guard, runs to completion, and hands the medium to the next caller.

use std::time::{Duration, Instant};

use pibridge_transport::Transport;

use crate::config::{BridgeConfig, SerialConfig};
use crate::error::{BridgeError, Result};
use crate::guard::{BusGuard, BusPermit};
use crate::router::{Router, Target};
use crate::rx::{ReceiveBuffer, RxError};
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::transaction::{Response, Transaction};

/// The transaction core bound to one bus medium.
pub struct PiBridge {
    bus: BusGuard<Box<dyn Transport>>,
    router: Router,
    config: BridgeConfig,
    stats: BridgeStats,
}

impl std::fmt::Debug for PiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiBridge")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl PiBridge {
    /// Bind a bridge to `transport`.
    pub fn new(transport: impl Transport + 'static, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            bus: BusGuard::new(Box::new(transport)),
            router: Router::new(&config),
            config,
            stats: BridgeStats::default(),
        })
    }

    /// Open the serial line described by `serial` and bind a bridge to it.
    ///
    /// `serial` replaces `config.serial`.
    pub fn open_serial(serial: &SerialConfig, mut config: BridgeConfig) -> Result<Self> {
        let port = pibridge_transport::SerialPort::open(&serial.device, serial.baud_rate)?;
        config.serial = serial.clone();
        Self::new(port, config)
    }

    /// Effective configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Address and timeout rules in effect.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Callers currently queued for the bus.
    pub fn queued_callers(&self) -> usize {
        self.bus.queue_len()
    }

    /// Send `payload` to `target` and wait for its reply.
    ///
    /// `max_len` bounds the reply payload; `timeout` overrides the domain
    /// default.
    pub fn request(
        &self,
        target: Target,
        command: u16,
        payload: &[u8],
        max_len: usize,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let route = self.router.route(target, command, timeout)?;
        let mut txn = Transaction::new(route.frame(payload), max_len, route.timeout);

        self.stats.record_request();
        let mut bus = self.bus.acquire();
        let result = txn.run_request(&mut **bus);
        bus.release();

        self.stats.record_noise(txn.noise_frames());
        self.stats.record_outcome(&result);
        if let Err(err) = &result {
            tracing::debug!(?target, command, error = %err, "request failed");
        }
        result
    }

    /// Send `payload` to `target` without waiting for a reply.
    pub fn send_to(&self, target: Target, command: u16, payload: &[u8]) -> Result<()> {
        let route = self.router.route(target, command, None)?;
        let mut txn = Transaction::new(route.frame(payload), 0, route.timeout);

        self.stats.record_send();
        let mut bus = self.bus.acquire();
        let result = txn.run_send(&mut **bus);
        bus.release();
        self.stats.record_outcome(&result);
        result
    }

    /// Request/response to a local I/O module. Returns the reply length.
    pub fn req_io(&self, address: u8, command: u8, send: &[u8], recv: &mut [u8]) -> Result<usize> {
        let response = self.request(
            Target::LocalIo { address },
            u16::from(command),
            send,
            recv.len(),
            None,
        )?;
        Ok(copy_payload(&response, recv))
    }

    /// Fire-and-forget command to a local I/O module.
    pub fn req_send_io(&self, address: u8, command: u8, send: &[u8]) -> Result<()> {
        self.send_to(Target::LocalIo { address }, u16::from(command), send)
    }

    /// Request/response to a gateway module with the default gateway timeout.
    pub fn req_gate(
        &self,
        destination: u8,
        command: u16,
        send: &[u8],
        recv: &mut [u8],
    ) -> Result<usize> {
        let response = self.request(
            Target::Gateway { destination },
            command,
            send,
            recv.len(),
            None,
        )?;
        Ok(copy_payload(&response, recv))
    }

    /// Request/response to a gateway module with an explicit timeout.
    pub fn req_gate_timeout(
        &self,
        destination: u8,
        command: u16,
        send: &[u8],
        recv: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let response = self.request(
            Target::Gateway { destination },
            command,
            send,
            recv.len(),
            Some(timeout),
        )?;
        Ok(copy_payload(&response, recv))
    }

    /// Fire-and-forget command to a gateway module.
    pub fn req_send_gate(&self, destination: u8, command: u16, send: &[u8]) -> Result<()> {
        self.send_to(Target::Gateway { destination }, command, send)
    }

    /// Wait without a deadline until `buf` is full of raw bytes.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.session().recv(buf)
    }

    /// Collect raw bytes until `buf` is full or `timeout` passes.
    pub fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.session().recv_timeout(buf, timeout)
    }

    /// Write raw bytes, no framing.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.session().send(data)
    }

    /// Discard all pending input.
    pub fn clear_fifo(&self) -> Result<()> {
        self.session().clear()
    }

    /// Hold the bus across several raw operations.
    ///
    /// Other callers queue until the session is dropped.
    pub fn session(&self) -> BusSession<'_> {
        BusSession {
            permit: self.bus.acquire(),
        }
    }
}

fn copy_payload(response: &Response, recv: &mut [u8]) -> usize {
    // The transaction already refused replies longer than `recv`.
    let len = response.payload.len();
    recv[..len].copy_from_slice(&response.payload);
    len
}

/// Exclusive raw access to the medium for callers that do their own framing.
pub struct BusSession<'a> {
    permit: BusPermit<'a, Box<dyn Transport>>,
}

impl BusSession<'_> {
    /// Write raw bytes.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.permit.send(data)?;
        Ok(())
    }

    /// Copy whatever is pending into `buf` without blocking.
    pub fn try_recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        match ReceiveBuffer::new(&mut **self.permit).receive(buf.len()) {
            Ok(bytes) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Err(RxError::Empty) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Wait without a deadline until `buf` is full.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut rx = ReceiveBuffer::new(&mut **self.permit);
        let mut filled = 0;
        while filled < buf.len() {
            let bytes = rx.receive_with_timeout(buf.len() - filled, None)?;
            buf[filled..filled + bytes.len()].copy_from_slice(&bytes);
            filled += bytes.len();
        }
        Ok(filled)
    }

    /// Collect bytes until `buf` is full or `timeout` passes.
    ///
    /// A zero timeout only takes what is already pending. Fails with
    /// [`BridgeError::TimedOut`] only if nothing at all arrived.
    pub fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + timeout;
        let mut rx = ReceiveBuffer::new(&mut **self.permit);
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let chunk = if remaining.is_zero() {
                rx.receive(buf.len() - filled)
            } else {
                rx.receive_with_timeout(buf.len() - filled, Some(remaining))
            };
            match chunk {
                Ok(bytes) => {
                    buf[filled..filled + bytes.len()].copy_from_slice(&bytes);
                    filled += bytes.len();
                }
                Err(RxError::Empty) | Err(RxError::TimedOut(_)) => break,
                Err(err) => return Err(err.into()),
            }
            if remaining.is_zero() {
                break;
            }
        }

        if filled == 0 {
            return Err(BridgeError::TimedOut(timeout));
        }
        Ok(filled)
    }

    /// Discard all pending input.
    pub fn clear(&mut self) -> Result<()> {
        ReceiveBuffer::new(&mut **self.permit).clear()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pibridge_frame::{decode_frame, encode, Frame, FrameError};
    use pibridge_transport::{link, MemoryDevice};
    use std::sync::Arc;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(5);

    fn bridge() -> (PiBridge, MemoryDevice) {
        let (transport, device) = link();
        let config = BridgeConfig::default()
            .with_io_timeout(Duration::from_millis(200))
            .with_gate_timeout(Duration::from_millis(300));
        (PiBridge::new(transport, config).unwrap(), device)
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        encode(frame).unwrap().to_vec()
    }

    /// Read one request frame from the controller.
    fn read_request(device: &MemoryDevice) -> Option<Frame> {
        let header = device.recv_exact(4, WAIT).ok()??;
        let header_size = if header[0] == pibridge_frame::GATEWAY_MARKER {
            5
        } else {
            4
        };
        let mut bytes = header;
        if header_size == 5 {
            bytes.extend(device.recv_exact(1, WAIT).ok()??);
        }
        let rest = bytes[header_size - 1] as usize + 1;
        bytes.extend(device.recv_exact(rest, WAIT).ok()??);
        decode_frame(&bytes).ok()
    }

    /// Module that answers every request with its own payload reversed.
    fn spawn_echo(device: MemoryDevice) -> thread::JoinHandle<Vec<Frame>> {
        thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(request) = read_request(&device) {
                let mut payload = request.payload.to_vec();
                payload.reverse();
                thread::sleep(Duration::from_millis(2));
                let reply = Frame::new(request.domain, request.address, request.command, payload);
                if device.send(&wire(&reply)).is_err() {
                    break;
                }
                seen.push(request);
            }
            seen
        })
    }

    #[test]
    fn req_io_returns_reply_length() {
        let (bridge, device) = bridge();
        let echo = spawn_echo(device);

        let mut recv = [0u8; 8];
        let len = bridge.req_io(0x05, 0x10, &[1, 2, 3], &mut recv).unwrap();
        assert_eq!(&recv[..len], &[3, 2, 1]);

        let stats = bridge.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.completed, 1);

        drop(bridge);
        let seen = echo.join().unwrap();
        assert_eq!(seen, vec![Frame::local_io(0x05, 0x10, vec![1, 2, 3])]);
    }

    #[test]
    fn req_gate_uses_wide_commands() {
        let (bridge, device) = bridge();
        let echo = spawn_echo(device);

        let mut recv = [0u8; 4];
        let len = bridge.req_gate(0x20, 0xBEEF, &[7, 8], &mut recv).unwrap();
        assert_eq!(&recv[..len], &[8, 7]);

        let len = bridge
            .req_gate_timeout(0x21, 0x0001, &[], &mut recv, Duration::from_secs(1))
            .unwrap();
        assert_eq!(len, 0);

        drop(bridge);
        let seen = echo.join().unwrap();
        assert_eq!(seen[0], Frame::gateway(0x20, 0xBEEF, vec![7, 8]));
        assert_eq!(seen[1].address, 0x21);
    }

    #[test]
    fn invalid_address_fails_before_bus_activity() {
        let (bridge, device) = bridge();
        let err = bridge.req_io(0, 0x10, &[], &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAddress { .. }));
        let err = bridge.req_send_gate(255, 0x10, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidAddress { .. }));

        let mut buf = [0u8; 4];
        assert_eq!(
            device
                .recv_timeout(&mut buf, Some(Duration::from_millis(20)))
                .unwrap(),
            0
        );
        assert_eq!(bridge.stats().requests, 0);
    }

    #[test]
    fn oversized_payload_is_an_encoding_error() {
        let (bridge, _device) = bridge();
        let err = bridge.req_send_io(1, 1, &[0u8; 300]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Encoding(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn timeout_releases_the_bus() {
        let (bridge, device) = bridge();

        let err = bridge.req_io(0x05, 0x10, &[1], &mut [0u8; 4]).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(bridge.stats().timeouts, 1);
        assert_eq!(bridge.queued_callers(), 0);

        // Drop the unanswered request, then serve the next call.
        read_request(&device).unwrap();
        let echo = spawn_echo(device);
        let mut recv = [0u8; 4];
        let len = bridge.req_io(0x05, 0x10, &[1, 2], &mut recv).unwrap();
        assert_eq!(&recv[..len], &[2, 1]);

        drop(bridge);
        echo.join().unwrap();
    }

    #[test]
    fn concurrent_callers_get_their_own_replies() {
        let (bridge, device) = bridge();
        let bridge = Arc::new(bridge);
        let echo = spawn_echo(device);

        let handles: Vec<_> = (1..=8u8)
            .map(|address| {
                let bridge = Arc::clone(&bridge);
                thread::spawn(move || {
                    for round in 0..4u8 {
                        let mut recv = [0u8; 2];
                        let len = bridge
                            .req_io(address, 0x10, &[address, round], &mut recv)
                            .unwrap();
                        assert_eq!(&recv[..len], &[round, address]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = bridge.stats();
        assert_eq!(stats.requests, 32);
        assert_eq!(stats.completed, 32);

        drop(bridge);
        assert_eq!(echo.join().unwrap().len(), 32);
    }

    #[test]
    fn callers_are_served_in_arrival_order() {
        let (bridge, device) = bridge();
        let bridge = Arc::new(bridge);
        let echo = spawn_echo(device);

        let session = bridge.session();
        let mut handles = Vec::new();
        for address in 1..=5u8 {
            let caller = Arc::clone(&bridge);
            handles.push(thread::spawn(move || {
                let mut recv = [0u8; 1];
                caller.req_io(address, 0x01, &[address], &mut recv).unwrap();
            }));
            let deadline = Instant::now() + WAIT;
            while bridge.queued_callers() < usize::from(address) {
                assert!(Instant::now() < deadline);
                thread::sleep(Duration::from_millis(1));
            }
        }
        drop(session);
        for handle in handles {
            handle.join().unwrap();
        }

        drop(bridge);
        let served: Vec<u8> = echo.join().unwrap().iter().map(|f| f.address).collect();
        assert_eq!(served, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn noise_is_counted() {
        let (bridge, device) = bridge();
        let module = thread::spawn(move || {
            let request = read_request(&device).unwrap();
            let mut bytes = wire(&Frame::local_io(0x09, request.command as u8, vec![1]));
            bytes.extend(wire(&Frame::local_io(request.address, request.command as u8, vec![2])));
            device.send(&bytes).unwrap();
            device
        });

        let mut recv = [0u8; 4];
        let len = bridge.req_io(0x05, 0x10, &[], &mut recv).unwrap();
        assert_eq!(&recv[..len], &[2]);
        assert_eq!(bridge.stats().noise_frames, 1);
        module.join().unwrap();
    }

    #[test]
    fn send_and_req_send_do_not_wait() {
        let (bridge, device) = bridge();
        bridge.send(&[0xDE, 0xAD]).unwrap();
        bridge.req_send_io(3, 0x20, &[1]).unwrap();
        bridge.req_send_gate(4, 0x2021, &[]).unwrap();

        assert_eq!(device.recv_exact(2, WAIT).unwrap().unwrap(), vec![0xDE, 0xAD]);
        assert_eq!(read_request(&device).unwrap(), Frame::local_io(3, 0x20, vec![1]));
        assert_eq!(read_request(&device).unwrap(), Frame::gateway(4, 0x2021, Bytes::new()));
        assert_eq!(bridge.stats().sends, 2);
    }

    #[test]
    fn recv_timeout_collects_partial_data() {
        let (bridge, device) = bridge();
        device.send(&[1, 2, 3]).unwrap();

        let mut buf = [0u8; 8];
        let len = bridge
            .recv_timeout(&mut buf, Duration::from_millis(30))
            .unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);

        let err = bridge
            .recv_timeout(&mut buf, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, BridgeError::TimedOut(_)));
    }

    #[test]
    fn recv_waits_until_full() {
        let (bridge, device) = bridge();
        let feeder = thread::spawn(move || {
            for chunk in [[1u8, 2], [3, 4]] {
                thread::sleep(Duration::from_millis(5));
                device.send(&chunk).unwrap();
            }
            device
        });

        let mut buf = [0u8; 4];
        assert_eq!(bridge.recv(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        feeder.join().unwrap();
    }

    #[test]
    fn clear_fifo_drops_pending_input() {
        let (bridge, device) = bridge();
        device.send(&[9, 9, 9]).unwrap();
        bridge.clear_fifo().unwrap();

        let mut session = bridge.session();
        assert_eq!(session.try_recv(&mut [0u8; 4]).unwrap(), 0);
        let err = session
            .recv_timeout(&mut [0u8; 4], Duration::ZERO)
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn rejects_invalid_config() {
        let (transport, _device) = link();
        let config = BridgeConfig {
            io_timeout_ms: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            PiBridge::new(transport, config),
            Err(BridgeError::Config(_))
        ));
    }
}
