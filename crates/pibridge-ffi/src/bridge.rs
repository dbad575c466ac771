use std::os::raw::c_char;
use std::time::Duration;

use pibridge_comm::{BridgeConfig, PiBridge, Result};

use crate::args;
use crate::error;
use crate::types::{BridgeHandle, PibBridgeHandle, PibResult};

fn with_bridge(handle: PibBridgeHandle, f: impl FnOnce(&PiBridge) -> i32) -> i32 {
    if handle.is_null() {
        return error::set_invalid_argument("bridge handle cannot be null").code();
    }

    let bridge_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *const BridgeHandle) }
    };

    f(&bridge_handle.bridge)
}

fn finish(result: Result<usize>) -> i32 {
    match result {
        Ok(len) => i32::try_from(len).unwrap_or(i32::MAX),
        Err(err) => error::map_bridge_error(&err).code(),
    }
}

pub(crate) fn into_handle(bridge: PiBridge) -> PibBridgeHandle {
    Box::into_raw(Box::new(BridgeHandle { bridge })) as PibBridgeHandle
}

fn open(config: BridgeConfig) -> PibBridgeHandle {
    let serial = config.serial.clone();
    match PiBridge::open_serial(&serial, config) {
        Ok(bridge) => into_handle(bridge),
        Err(err) => {
            let _ = error::map_bridge_error(&err);
            std::ptr::null_mut()
        }
    }
}

/// Open `device` at `baud` with default timeouts and address ranges.
///
/// A `baud` of 0 selects the default line speed.
///
/// # Safety
/// `device` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn pibridge_open(device: *const c_char, baud: u32) -> PibBridgeHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let device = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(device, "device") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };

        let mut config = BridgeConfig::default();
        config.serial.device = device.into();
        if baud != 0 {
            config.serial.baud_rate = baud;
        }
        open(config)
    })
}

/// Open the bridge described by a JSON config file.
///
/// # Safety
/// `path` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn pibridge_open_config(path: *const c_char) -> PibBridgeHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let path = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(path, "path") } {
                Some(v) => v,
                None => return std::ptr::null_mut(),
            }
        };

        match BridgeConfig::from_json_file(path) {
            Ok(config) => open(config),
            Err(err) => {
                let _ = error::map_bridge_error(&err);
                std::ptr::null_mut()
            }
        }
    })
}

/// Close a bridge handle. Null is ignored.
///
/// # Safety
/// `handle` must be null or a handle returned by `pibridge_open*` that has
/// not been closed yet.
#[no_mangle]
pub unsafe extern "C" fn pibridge_close(handle: PibBridgeHandle) {
    crate::ffi_boundary((), || {
        if handle.is_null() {
            return;
        }
        // SAFETY: Pointer ownership is transferred back from the caller.
        unsafe {
            drop(Box::from_raw(handle as *mut BridgeHandle));
        }
    });
}

/// Request/response to a local I/O module. Returns the reply length.
///
/// # Safety
/// `handle` must be valid. `snd_buf` must be readable for `snd_len` bytes
/// and `rcv_buf` writable for `rcv_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_req_io(
    handle: PibBridgeHandle,
    addr: u8,
    cmd: u8,
    snd_buf: *const u8,
    snd_len: u8,
    rcv_buf: *mut u8,
    rcv_len: u8,
) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(send) = (unsafe { args::bytes_arg(snd_buf, snd_len.into(), "snd_buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        // SAFETY: As above.
        let Some(recv) = (unsafe { args::bytes_out_arg(rcv_buf, rcv_len.into(), "rcv_buf") })
        else {
            return PibResult::InvalidArgument.code();
        };
        with_bridge(handle, |bridge| finish(bridge.req_io(addr, cmd, send, recv)))
    })
}

/// Fire-and-forget command to a local I/O module.
///
/// # Safety
/// `handle` must be valid and `snd_buf` readable for `snd_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_req_send_io(
    handle: PibBridgeHandle,
    addr: u8,
    cmd: u8,
    snd_buf: *const u8,
    snd_len: u8,
) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(send) = (unsafe { args::bytes_arg(snd_buf, snd_len.into(), "snd_buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        with_bridge(handle, |bridge| {
            finish(bridge.req_send_io(addr, cmd, send).map(|()| 0))
        })
    })
}

/// Request/response to a gateway module with the default timeout.
///
/// # Safety
/// `handle` must be valid. `snd_buf` must be readable for `snd_len` bytes
/// and `rcv_buf` writable for `rcv_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_req_gate(
    handle: PibBridgeHandle,
    dst: u8,
    cmd: u16,
    snd_buf: *const u8,
    snd_len: u8,
    rcv_buf: *mut u8,
    rcv_len: u8,
) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(send) = (unsafe { args::bytes_arg(snd_buf, snd_len.into(), "snd_buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        // SAFETY: As above.
        let Some(recv) = (unsafe { args::bytes_out_arg(rcv_buf, rcv_len.into(), "rcv_buf") })
        else {
            return PibResult::InvalidArgument.code();
        };
        with_bridge(handle, |bridge| finish(bridge.req_gate(dst, cmd, send, recv)))
    })
}

/// Request/response to a gateway module with a timeout in milliseconds.
///
/// # Safety
/// `handle` must be valid. `snd_buf` must be readable for `snd_len` bytes
/// and `rcv_buf` writable for `rcv_len` bytes.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn pibridge_req_gate_tmt(
    handle: PibBridgeHandle,
    dst: u8,
    cmd: u16,
    snd_buf: *const u8,
    snd_len: u8,
    rcv_buf: *mut u8,
    rcv_len: u8,
    tmt: u16,
) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(send) = (unsafe { args::bytes_arg(snd_buf, snd_len.into(), "snd_buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        // SAFETY: As above.
        let Some(recv) = (unsafe { args::bytes_out_arg(rcv_buf, rcv_len.into(), "rcv_buf") })
        else {
            return PibResult::InvalidArgument.code();
        };
        let timeout = Duration::from_millis(tmt.into());
        with_bridge(handle, |bridge| {
            finish(bridge.req_gate_timeout(dst, cmd, send, recv, timeout))
        })
    })
}

/// Fire-and-forget command to a gateway module.
///
/// # Safety
/// `handle` must be valid and `snd_buf` readable for `snd_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_req_send_gate(
    handle: PibBridgeHandle,
    dst: u8,
    cmd: u16,
    snd_buf: *const u8,
    snd_len: u8,
) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(send) = (unsafe { args::bytes_arg(snd_buf, snd_len.into(), "snd_buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        with_bridge(handle, |bridge| {
            finish(bridge.req_send_gate(dst, cmd, send).map(|()| 0))
        })
    })
}

/// Block until `len` raw bytes have arrived.
///
/// # Safety
/// `handle` must be valid and `buf` writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_recv(handle: PibBridgeHandle, buf: *mut u8, len: u8) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(buf) = (unsafe { args::bytes_out_arg(buf, len.into(), "buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        with_bridge(handle, |bridge| finish(bridge.recv(buf)))
    })
}

/// Collect up to `len` raw bytes for at most `timeout` milliseconds.
///
/// # Safety
/// `handle` must be valid and `buf` writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_recv_timeout(
    handle: PibBridgeHandle,
    buf: *mut u8,
    len: u8,
    timeout: u16,
) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(buf) = (unsafe { args::bytes_out_arg(buf, len.into(), "buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        let timeout = Duration::from_millis(timeout.into());
        with_bridge(handle, |bridge| finish(bridge.recv_timeout(buf, timeout)))
    })
}

/// Write `len` raw bytes, no framing.
///
/// # Safety
/// `handle` must be valid and `buf` readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn pibridge_send(handle: PibBridgeHandle, buf: *const u8, len: u32) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        // SAFETY: Caller guarantees buffer validity; null checks happen in helpers.
        let Some(data) = (unsafe { args::bytes_arg(buf, len as usize, "buf") }) else {
            return PibResult::InvalidArgument.code();
        };
        with_bridge(handle, |bridge| finish(bridge.send(data).map(|()| 0)))
    })
}

/// Discard all pending input.
///
/// # Safety
/// `handle` must be valid.
#[no_mangle]
pub unsafe extern "C" fn pibridge_clear_fifo(handle: PibBridgeHandle) -> i32 {
    crate::ffi_boundary(PibResult::Internal.code(), || {
        error::clear_error_state();
        with_bridge(handle, |bridge| finish(bridge.clear_fifo().map(|()| 0)))
    })
}
