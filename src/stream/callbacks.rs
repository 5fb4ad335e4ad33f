// In: src/stream/callbacks.rs

//! The host functions the native reader calls back into. Each one resolves a
//! handle through the registry and never lets a panic cross the boundary.

use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use super::registry::registry;
use crate::error::{CarrowError, Result};
use crate::native::csv::{StreamCallbacks, StreamResult};

fn callback<F>(body: F) -> StreamResult
where
    F: FnOnce() -> Result<i64>,
{
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(size)) => StreamResult {
            size,
            err: ptr::null_mut(),
        },
        Ok(Err(e)) => error_result(e.to_string()),
        Err(_) => error_result("stream callback panicked".to_string()),
    }
}

fn error_result(message: String) -> StreamResult {
    let err = CString::new(message.replace('\0', "\u{fffd}"))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut());
    StreamResult { size: 0, err }
}

unsafe extern "C" fn stream_read(handle: i64, out: *mut u8, size: i64) -> StreamResult {
    callback(|| {
        let size = usize::try_from(size)
            .map_err(|_| CarrowError::Marshal(format!("negative read size {}", size)))?;
        if out.is_null() || size == 0 {
            return Ok(0);
        }
        let buf = std::slice::from_raw_parts_mut(out, size);
        Ok(registry().read(handle, buf)? as i64)
    })
}

unsafe extern "C" fn stream_tell(handle: i64) -> StreamResult {
    callback(|| registry().tell(handle))
}

unsafe extern "C" fn stream_closed(handle: i64) -> StreamResult {
    callback(|| registry().closed(handle).map(i64::from))
}

unsafe extern "C" fn stream_free_err(err: *mut c_char) {
    if !err.is_null() {
        drop(CString::from_raw(err));
    }
}

pub(crate) fn callbacks() -> StreamCallbacks {
    StreamCallbacks {
        read: stream_read,
        tell: stream_tell,
        closed: stream_closed,
        free_err: stream_free_err,
    }
}
