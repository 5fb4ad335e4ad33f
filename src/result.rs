// In: src/result.rs

//! Host-side decoding of `NativeResult` records.
//!
//! Every native call goes through `unmarshal` exactly once: the error string,
//! if any, is copied into an owned `CarrowError` and released immediately, so
//! no native error buffer outlives the call that produced it.

use std::ffi::{c_void, CStr};

use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::result::{carrow_bytes_free, carrow_error_free, NativeResult, StatusCode};

/// The success payload of a native call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Payload {
    pub ptr: *mut c_void,
    pub int: i64,
    pub float: f64,
}

/// Converts a result record into a payload or an owned error.
pub(crate) fn unmarshal(res: NativeResult) -> Result<Payload> {
    if !res.err.is_null() {
        let message = unsafe { CStr::from_ptr(res.err) }.to_string_lossy().into_owned();
        unsafe { carrow_error_free(res.err) };
        return Err(CarrowError::from_native(StatusCode::from_code(res.int), message));
    }
    Ok(Payload {
        ptr: res.ptr,
        int: res.int,
        float: res.float,
    })
}

/// Takes ownership of the returned object. An absent object is a `Creation` error.
pub(crate) fn into_handle(res: NativeResult, kind: &'static str) -> Result<NativeHandle> {
    NativeHandle::new(unmarshal(res)?.ptr, kind)
}

/// Like `into_handle`, but an absent object is `None` instead of an error.
pub(crate) fn into_optional_handle(res: NativeResult, kind: &'static str) -> Result<Option<NativeHandle>> {
    let payload = unmarshal(res)?;
    if payload.ptr.is_null() {
        return Ok(None);
    }
    NativeHandle::new(payload.ptr, kind).map(Some)
}

/// Copies a transient native string and releases the native buffer.
pub(crate) fn into_string(res: NativeResult) -> Result<String> {
    let payload = unmarshal(res)?;
    let len = usize::try_from(payload.int)
        .map_err(|_| CarrowError::Marshal(format!("negative string length {}", payload.int)))?;
    let copied = if payload.ptr.is_null() || len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(payload.ptr as *const u8, len) }.to_vec()
    };
    unsafe { carrow_bytes_free(payload.ptr, payload.int) };
    String::from_utf8(copied).map_err(|e| CarrowError::Marshal(format!("native string is not UTF-8: {}", e)))
}

pub(crate) fn into_int(res: NativeResult) -> Result<i64> {
    Ok(unmarshal(res)?.int)
}

pub(crate) fn into_float(res: NativeResult) -> Result<f64> {
    Ok(unmarshal(res)?.float)
}

pub(crate) fn into_bool(res: NativeResult) -> Result<bool> {
    Ok(unmarshal(res)?.int != 0)
}

pub(crate) fn into_unit(res: NativeResult) -> Result<()> {
    unmarshal(res).map(|_| ())
}

/// Converts a native count or length into a `usize`.
pub(crate) fn into_len(res: NativeResult) -> Result<usize> {
    let n = into_int(res)?;
    usize::try_from(n).map_err(|_| CarrowError::Marshal(format!("negative length {}", n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_copied_and_mapped() {
        let res = NativeResult::error(StatusCode::Validation, "column 1 has 3 rows, expected 4");
        let err = unmarshal(res).unwrap_err();
        assert!(matches!(err, CarrowError::Validation(_)));
        assert_eq!(err.to_string(), "column 1 has 3 rows, expected 4");
    }

    #[test]
    fn test_string_payload_is_copied() {
        let res = NativeResult::bytes("höhe".as_bytes().to_vec());
        assert_eq!(into_string(res).unwrap(), "höhe");
        assert_eq!(into_string(NativeResult::bytes(Vec::new())).unwrap(), "");
    }

    #[test]
    fn test_absent_object() {
        assert!(into_optional_handle(NativeResult::ok(), "field").unwrap().is_none());
        let err = into_handle(NativeResult::ok(), "field").unwrap_err();
        assert!(matches!(err, CarrowError::Creation(ref k) if k == "field"));
    }

    #[test]
    fn test_scalar_payloads() {
        assert_eq!(into_int(NativeResult::int(-3)).unwrap(), -3);
        assert_eq!(into_float(NativeResult::float(2.5)).unwrap(), 2.5);
        assert!(into_bool(NativeResult::int(1)).unwrap());
        assert!(into_len(NativeResult::int(-1)).is_err());
    }
}
