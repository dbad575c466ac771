use std::ffi::c_void;

use pibridge_comm::PiBridge;

/// Result codes returned by every call. Lengths are returned as
/// non-negative values; errors are always negative.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PibResult {
    Ok = 0,
    InvalidArgument = -1,
    InvalidAddress = -2,
    EncodingError = -3,
    TransportError = -4,
    Timeout = -5,
    DecodeError = -6,
    ResponseTooLarge = -7,
    ConfigError = -8,
    Internal = -99,
}

impl PibResult {
    pub(crate) fn code(self) -> i32 {
        self as i32
    }
}

pub const PIB_OK: PibResult = PibResult::Ok;
pub const PIB_ERR_INVALID_ARGUMENT: PibResult = PibResult::InvalidArgument;
pub const PIB_ERR_INVALID_ADDRESS: PibResult = PibResult::InvalidAddress;
pub const PIB_ERR_ENCODING: PibResult = PibResult::EncodingError;
pub const PIB_ERR_TRANSPORT: PibResult = PibResult::TransportError;
pub const PIB_ERR_TIMEOUT: PibResult = PibResult::Timeout;
pub const PIB_ERR_DECODE: PibResult = PibResult::DecodeError;
pub const PIB_ERR_RESPONSE_TOO_LARGE: PibResult = PibResult::ResponseTooLarge;
pub const PIB_ERR_CONFIG: PibResult = PibResult::ConfigError;
pub const PIB_ERR_INTERNAL: PibResult = PibResult::Internal;

pub type PibBridgeHandle = *mut c_void;

pub(crate) struct BridgeHandle {
    pub(crate) bridge: PiBridge,
}
