use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use pibridge_comm::BridgeError;

use crate::types::PibResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> PibResult {
    set_error_message(message);
    PibResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_bridge_error(err: &BridgeError) -> PibResult {
    set_error_message(err.to_string());
    match err {
        BridgeError::Encoding(_) => PibResult::EncodingError,
        BridgeError::InvalidAddress { .. } => PibResult::InvalidAddress,
        BridgeError::InvalidTimeout => PibResult::InvalidArgument,
        BridgeError::Transport(_) => PibResult::TransportError,
        BridgeError::TimedOut(_) => PibResult::Timeout,
        BridgeError::Decode(_) => PibResult::DecodeError,
        BridgeError::ResponseTooLarge { .. } => PibResult::ResponseTooLarge,
        BridgeError::ConfigRead { .. } | BridgeError::Json(_) | BridgeError::Config(_) => {
            PibResult::ConfigError
        }
        #[allow(unreachable_patterns)]
        _ => PibResult::Internal,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
