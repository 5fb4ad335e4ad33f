// In: src/native/builder.rs

//! Native array builders. The host never appends one value at a time: it sends
//! whole slices of buffered values, one boundary crossing per flush.

use std::ffi::c_void;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampNanosecondBuilder,
};

use super::result::{NativeResult, StatusCode};
use super::{bytes_arg, guard, into_raw, object_mut, NativeError, NativeObject};
use crate::types::DType;

/// A typed arrow builder that seals exactly once.
pub(crate) enum NativeBuilder {
    Bool(BooleanBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    String(StringBuilder),
    Timestamp(TimestampNanosecondBuilder),
    Finished,
}

impl NativeBuilder {
    fn new(dtype: DType) -> Self {
        match dtype {
            DType::Bool => NativeBuilder::Bool(BooleanBuilder::new()),
            DType::Int64 => NativeBuilder::Int64(Int64Builder::new()),
            DType::Float64 => NativeBuilder::Float64(Float64Builder::new()),
            DType::String => NativeBuilder::String(StringBuilder::new()),
            DType::Timestamp => NativeBuilder::Timestamp(TimestampNanosecondBuilder::new()),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            NativeBuilder::Bool(_) => "bool",
            NativeBuilder::Int64(_) => "int64",
            NativeBuilder::Float64(_) => "float64",
            NativeBuilder::String(_) => "string",
            NativeBuilder::Timestamp(_) => "timestamp",
            NativeBuilder::Finished => "finished",
        }
    }

    fn finish(&mut self) -> Result<ArrayRef, NativeError> {
        let array: ArrayRef = match std::mem::replace(self, NativeBuilder::Finished) {
            NativeBuilder::Bool(mut b) => Arc::new(b.finish()),
            NativeBuilder::Int64(mut b) => Arc::new(b.finish()),
            NativeBuilder::Float64(mut b) => Arc::new(b.finish()),
            NativeBuilder::String(mut b) => Arc::new(b.finish()),
            NativeBuilder::Timestamp(mut b) => Arc::new(b.finish()),
            NativeBuilder::Finished => {
                return Err(NativeError::invalid("array builder already finished"));
            }
        };
        Ok(array)
    }
}

unsafe fn builder_mut<'a>(ptr: *mut c_void) -> Result<&'a mut NativeBuilder, NativeError> {
    match object_mut(ptr)? {
        NativeObject::Builder(b) => Ok(b),
        other => Err(NativeError::new(
            StatusCode::TypeError,
            format!("expected array builder, got {}", other.kind()),
        )),
    }
}

fn mismatch(builder: &NativeBuilder, values: &str) -> NativeError {
    if matches!(builder, NativeBuilder::Finished) {
        return NativeError::invalid("array builder already finished");
    }
    NativeError::new(
        StatusCode::TypeError,
        format!("can't append {} values to a {} builder", values, builder.describe()),
    )
}

unsafe fn typed_slice<'a, T>(values: *const T, len: usize) -> &'a [T] {
    if values.is_null() || len == 0 {
        return &[];
    }
    std::slice::from_raw_parts(values, len)
}

//==================================================================================
// Entry Points
//==================================================================================

/// Creates a builder for `dtype`. Unknown codes yield a null object.
#[no_mangle]
pub extern "C" fn carrow_builder_new(dtype: i32) -> NativeResult {
    guard(|| match DType::from_code(dtype) {
        Some(dtype) => Ok(NativeResult::object(into_raw(NativeObject::Builder(
            NativeBuilder::new(dtype),
        )))),
        None => Ok(NativeResult::ok()),
    })
}

/// Bulk-appends booleans encoded as one byte each (non-zero is `true`).
///
/// # Safety
/// `builder` must be a live builder; `values` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_builder_append_bools(builder: *mut c_void, values: *const u8, len: usize) -> NativeResult {
    guard(|| {
        match builder_mut(builder)? {
            NativeBuilder::Bool(b) => {
                for &v in bytes_arg(values, len) {
                    b.append_value(v != 0);
                }
                Ok(NativeResult::ok())
            }
            other => Err(mismatch(other, "bool")),
        }
    })
}

/// # Safety
/// `builder` must be a live builder; `values` valid for `len` elements.
#[no_mangle]
pub unsafe extern "C" fn carrow_builder_append_ints(builder: *mut c_void, values: *const i64, len: usize) -> NativeResult {
    guard(|| {
        match builder_mut(builder)? {
            NativeBuilder::Int64(b) => {
                b.append_slice(typed_slice(values, len));
                Ok(NativeResult::ok())
            }
            other => Err(mismatch(other, "int64")),
        }
    })
}

/// # Safety
/// `builder` must be a live builder; `values` valid for `len` elements.
#[no_mangle]
pub unsafe extern "C" fn carrow_builder_append_floats(builder: *mut c_void, values: *const f64, len: usize) -> NativeResult {
    guard(|| {
        match builder_mut(builder)? {
            NativeBuilder::Float64(b) => {
                b.append_slice(typed_slice(values, len));
                Ok(NativeResult::ok())
            }
            other => Err(mismatch(other, "float64")),
        }
    })
}

/// Bulk-appends timestamps given as nanoseconds since the Unix epoch.
///
/// # Safety
/// `builder` must be a live builder; `values` valid for `len` elements.
#[no_mangle]
pub unsafe extern "C" fn carrow_builder_append_timestamps(builder: *mut c_void, values: *const i64, len: usize) -> NativeResult {
    guard(|| {
        match builder_mut(builder)? {
            NativeBuilder::Timestamp(b) => {
                b.append_slice(typed_slice(values, len));
                Ok(NativeResult::ok())
            }
            other => Err(mismatch(other, "timestamp")),
        }
    })
}

/// Bulk-appends `count` strings given as parallel pointer/length arrays. The
/// bytes are copied; the caller keeps ownership of its buffers.
///
/// # Safety
/// `builder` must be a live builder; `ptrs` and `lens` valid for `count`
/// elements, each `ptrs[i]` valid for `lens[i]` bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_builder_append_strings(
    builder: *mut c_void,
    ptrs: *const *const u8,
    lens: *const usize,
    count: usize,
) -> NativeResult {
    guard(|| {
        match builder_mut(builder)? {
            NativeBuilder::String(b) => {
                let ptrs = typed_slice(ptrs, count);
                let lens = typed_slice(lens, count);
                for (&ptr, &len) in ptrs.iter().zip(lens) {
                    let value = std::str::from_utf8(bytes_arg(ptr, len))
                        .map_err(|e| NativeError::invalid(format!("invalid UTF-8 string value: {}", e)))?;
                    b.append_value(value);
                }
                Ok(NativeResult::ok())
            }
            other => Err(mismatch(other, "string")),
        }
    })
}

/// Seals the builder into an immutable array. A second call is an error.
///
/// # Safety
/// `builder` must be a live builder.
#[no_mangle]
pub unsafe extern "C" fn carrow_builder_finish(builder: *mut c_void) -> NativeResult {
    guard(|| {
        let array = builder_mut(builder)?.finish()?;
        Ok(NativeResult::object(into_raw(NativeObject::Array(array))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::carrow_object_free;
    use crate::native::result::carrow_error_free;

    #[test]
    fn test_second_finish_is_rejected() {
        let b = carrow_builder_new(DType::Int64.code());
        let first = unsafe { carrow_builder_finish(b.ptr) };
        assert!(first.err.is_null());
        let second = unsafe { carrow_builder_finish(b.ptr) };
        assert!(!second.err.is_null());
        unsafe {
            carrow_error_free(second.err);
            carrow_object_free(first.ptr);
            carrow_object_free(b.ptr);
        }
    }

    #[test]
    fn test_append_of_wrong_type_is_a_type_error() {
        let b = carrow_builder_new(DType::Float64.code());
        let values = [1i64, 2, 3];
        let res = unsafe { carrow_builder_append_ints(b.ptr, values.as_ptr(), values.len()) };
        assert_eq!(StatusCode::from_code(res.int), StatusCode::TypeError);
        unsafe {
            carrow_error_free(res.err);
            carrow_object_free(b.ptr);
        }
    }
}
