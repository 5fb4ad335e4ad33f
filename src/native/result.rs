// In: src/native/result.rs

//! The result record every native entry point returns, and the ownership rules
//! for the buffers it carries.
//!
//! Contract:
//! * `err` non-null: the call failed. `int` holds a `StatusCode`, `ptr` is
//!   meaningless, and the host must release `err` with `carrow_error_free`
//!   exactly once.
//! * `err` null: `ptr`, `int` or `float` is the payload, depending on the call.
//!   A null `ptr` on an object-returning call means "not created", which is
//!   distinct from an error.

use std::ffi::{c_char, c_void, CString};
use std::ptr;

/// Status codes carried in `NativeResult::int` when `err` is set.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 0,
    Invalid = 1,
    TypeError = 2,
    IndexError = 3,
    KeyError = 4,
    Validation = 5,
    IoError = 6,
    Timeout = 7,
    Connection = 8,
}

impl StatusCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => StatusCode::Ok,
            2 => StatusCode::TypeError,
            3 => StatusCode::IndexError,
            4 => StatusCode::KeyError,
            5 => StatusCode::Validation,
            6 => StatusCode::IoError,
            7 => StatusCode::Timeout,
            8 => StatusCode::Connection,
            _ => StatusCode::Invalid,
        }
    }
}

/// The fixed result record of the native ABI.
#[repr(C)]
#[derive(Debug)]
pub struct NativeResult {
    pub ptr: *mut c_void,
    pub err: *mut c_char,
    pub int: i64,
    pub float: f64,
}

impl NativeResult {
    pub(crate) fn ok() -> Self {
        Self {
            ptr: ptr::null_mut(),
            err: ptr::null_mut(),
            int: 0,
            float: 0.0,
        }
    }

    pub(crate) fn object(ptr: *mut c_void) -> Self {
        Self { ptr, ..Self::ok() }
    }

    pub(crate) fn int(value: i64) -> Self {
        Self {
            int: value,
            ..Self::ok()
        }
    }

    pub(crate) fn float(value: f64) -> Self {
        Self {
            float: value,
            ..Self::ok()
        }
    }

    /// Hands a byte buffer to the host. `int` is the length; the host copies the
    /// bytes and releases them with `carrow_bytes_free(ptr, len)`.
    pub(crate) fn bytes(data: Vec<u8>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let ptr = Box::into_raw(boxed) as *mut u8;
        Self {
            ptr: ptr as *mut c_void,
            int: len as i64,
            ..Self::ok()
        }
    }

    pub(crate) fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            err: error_string(message.into()),
            int: code as i64,
            ..Self::ok()
        }
    }
}

/// Converts a message into a NUL-terminated, native-owned C string.
pub(crate) fn error_string(message: String) -> *mut c_char {
    // Interior NULs would truncate the message on the host side.
    let sanitized = message.replace('\0', "\u{fffd}");
    match CString::new(sanitized) {
        Ok(s) => s.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Releases an error string returned in `NativeResult::err`.
///
/// # Safety
/// `err` must be null or a pointer previously returned in `NativeResult::err`
/// that has not been released yet.
#[no_mangle]
pub unsafe extern "C" fn carrow_error_free(err: *mut c_char) {
    if err.is_null() {
        return;
    }
    drop(CString::from_raw(err));
}

/// Releases a byte buffer returned by `NativeResult::bytes`.
///
/// # Safety
/// `data` and `len` must come from the same `NativeResult` and must not have
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn carrow_bytes_free(data: *mut c_void, len: i64) {
    if data.is_null() {
        return;
    }
    let slice = ptr::slice_from_raw_parts_mut(data as *mut u8, len as usize);
    drop(Box::from_raw(slice));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_error_result_carries_code_and_message() {
        let res = NativeResult::error(StatusCode::KeyError, "missing");
        assert!(res.ptr.is_null());
        assert_eq!(StatusCode::from_code(res.int), StatusCode::KeyError);
        let msg = unsafe { CStr::from_ptr(res.err) }.to_str().unwrap().to_string();
        assert_eq!(msg, "missing");
        unsafe { carrow_error_free(res.err) };
    }

    #[test]
    fn test_bytes_result_round_trip() {
        let res = NativeResult::bytes(b"hello".to_vec());
        assert_eq!(res.int, 5);
        let copied = unsafe { std::slice::from_raw_parts(res.ptr as *const u8, 5) }.to_vec();
        assert_eq!(copied, b"hello");
        unsafe { carrow_bytes_free(res.ptr, res.int) };

        // Empty buffers are still released through the same path.
        let empty = NativeResult::bytes(Vec::new());
        assert_eq!(empty.int, 0);
        unsafe { carrow_bytes_free(empty.ptr, empty.int) };
    }

    #[test]
    fn test_interior_nul_is_sanitized() {
        let res = NativeResult::error(StatusCode::Invalid, "a\0b");
        let msg = unsafe { CStr::from_ptr(res.err) }.to_string_lossy().into_owned();
        assert_eq!(msg, "a\u{fffd}b");
        unsafe { carrow_error_free(res.err) };
    }
}
