use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Longest single wait handed to the driver when the caller has no deadline.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// A frame that cannot leave the UART within this window means the line is stuck.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Serial line in 8N1 mode without flow control.
///
/// Bounded waits are delegated to the driver through the port's read
/// timeout, so a waiting caller sleeps in the kernel instead of spinning.
pub struct SerialPort {
    port: Box<dyn serialport::SerialPort>,
    path: PathBuf,
    baud_rate: u32,
}

impl SerialPort {
    /// Open `path` at `baud_rate`.
    pub fn open(path: impl AsRef<Path>, baud_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if baud_rate == 0 {
            return Err(TransportError::UnsupportedBaud(baud_rate));
        }

        let port = serialport::new(path.to_string_lossy(), baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|err| open_error(&path, err))?;

        info!(?path, baud_rate, "opened serial port");
        Self::from_native(port, path, baud_rate)
    }

    /// Wrap a port that is already open.
    pub(crate) fn from_native(
        port: Box<dyn serialport::SerialPort>,
        path: PathBuf,
        baud_rate: u32,
    ) -> Result<Self> {
        let mut port = Self {
            port,
            path,
            baud_rate,
        };
        // Whatever sat in the driver before we configured the line is garbage.
        port.discard_input()?;
        Ok(port)
    }

    /// Device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured line speed.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// One read bounded by `wait`. Returns 0 when the wait elapses.
    fn read_within(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize> {
        self.port.set_timeout(wait).map_err(into_io)?;
        loop {
            match self.port.read(buf) {
                // The driver only wakes a reader for data; zero bytes is a hangup.
                Ok(0) if !wait.is_zero() => return Err(TransportError::Closed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(0)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl Transport for SerialPort {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.set_timeout(WRITE_TIMEOUT).map_err(into_io)?;
        self.port.write_all(data)?;
        // Drain so the line is free for the module's answer when we return.
        self.port.flush()?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.read_within(buf, Duration::ZERO)
    }

    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(timeout) = timeout else {
            loop {
                let n = self.read_within(buf, IDLE_WAIT)?;
                if n > 0 {
                    return Ok(n);
                }
            }
        };

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let n = self.read_within(buf, remaining)?;
            if n > 0 || remaining.is_zero() {
                return Ok(n);
            }
        }
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(into_io)?;
        debug!(path = ?self.path, "flushed serial input");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

fn into_io(err: serialport::Error) -> TransportError {
    TransportError::Io(err.into())
}

fn open_error(path: &Path, err: serialport::Error) -> TransportError {
    let path = path.to_path_buf();
    match err.kind() {
        serialport::ErrorKind::InvalidInput => TransportError::Configure {
            path,
            source: err.into(),
        },
        _ => TransportError::Open {
            path,
            source: err.into(),
        },
    }
}
