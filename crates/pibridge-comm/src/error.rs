use std::path::PathBuf;
use std::time::Duration;

use pibridge_frame::{Domain, FrameError};

/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The outbound request cannot be encoded.
    #[error("encoding error: {0}")]
    Encoding(FrameError),

    /// The address is outside the valid range for its domain.
    #[error("invalid {domain} address {address} (valid {first}..={last})")]
    InvalidAddress {
        domain: Domain,
        address: u8,
        first: u8,
        last: u8,
    },

    /// A zero timeout was supplied.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pibridge_transport::TransportError),

    /// No matching response before the deadline.
    #[error("no response within {0:?}")]
    TimedOut(Duration),

    /// Only undecodable bytes arrived before the deadline.
    #[error("decode error: {0}")]
    Decode(FrameError),

    /// The response does not fit the caller's receive buffer.
    #[error("response payload too large ({len} bytes, receive buffer {max})")]
    ResponseTooLarge { len: usize, max: usize },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The blocking worker running the call failed.
    #[cfg(feature = "async")]
    #[error("blocking worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl BridgeError {
    /// Returns true if the module did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::TimedOut(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
