use std::fmt;
use std::io;

use pibridge_comm::BridgeError;
use pibridge_frame::FrameError;
use pibridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { path, source } if source.kind() == io::ErrorKind::PermissionDenied => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        TransportError::Open { path, source } => CliError::new(
            TRANSPORT_ERROR,
            format!("{context}: {}: {source}", path.display()),
        ),
        TransportError::Configure { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::PayloadTooLarge { .. } | FrameError::CommandOutOfRange { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::Truncated { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Transport(err) => transport_error(context, err),
        BridgeError::Encoding(err) | BridgeError::Decode(err) => frame_error(context, err),
        BridgeError::TimedOut(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        BridgeError::InvalidAddress { .. } | BridgeError::InvalidTimeout => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        BridgeError::ResponseTooLarge { .. }
        | BridgeError::Json(_)
        | BridgeError::Config(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        BridgeError::ConfigRead { source, .. } => io_error(context, source),
        #[allow(unreachable_patterns)]
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
