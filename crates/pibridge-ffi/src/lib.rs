//! pibridge-ffi: C-ABI exports for the piBridge transaction core.
//!
//! Every call takes the handle returned by `pibridge_open` and returns a
//! length (`>= 0`) or a negative [`PibResult`]. The message for the most
//! recent failure on the calling thread is available from
//! `pibridge_last_error`.

mod args;
mod bridge;
mod error;
mod types;

use std::panic::AssertUnwindSafe;

pub use bridge::{
    pibridge_clear_fifo, pibridge_close, pibridge_open, pibridge_open_config, pibridge_recv,
    pibridge_recv_timeout, pibridge_req_gate, pibridge_req_gate_tmt, pibridge_req_io,
    pibridge_req_send_gate, pibridge_req_send_io, pibridge_send,
};
pub use types::{
    PibBridgeHandle, PibResult, PIB_ERR_CONFIG, PIB_ERR_DECODE, PIB_ERR_ENCODING,
    PIB_ERR_INTERNAL, PIB_ERR_INVALID_ADDRESS, PIB_ERR_INVALID_ARGUMENT,
    PIB_ERR_RESPONSE_TOO_LARGE, PIB_ERR_TIMEOUT, PIB_ERR_TRANSPORT, PIB_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

#[no_mangle]
pub extern "C" fn pibridge_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
