// In: src/array.rs

//! Immutable, native-owned arrays and their typed positional getters.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::table::*;
use crate::result::{into_bool, into_float, into_int, into_len, into_string};
use crate::types::DType;

/// A fixed-length, homogeneously typed sequence of values. Length and dtype
/// are cached at construction; getters check both before crossing into native
/// code, so out-of-range or mistyped access is an error, never UB.
#[derive(Debug)]
pub struct Array {
    handle: NativeHandle,
    len: usize,
    dtype: DType,
}

impl Array {
    pub(crate) fn from_handle(handle: NativeHandle) -> Result<Self> {
        let ptr = handle.as_ptr()?;
        let len = into_len(unsafe { carrow_array_length(ptr) })?;
        let code = into_int(unsafe { carrow_array_dtype(ptr) })?;
        let dtype = i32::try_from(code)
            .ok()
            .and_then(DType::from_code)
            .ok_or_else(|| CarrowError::Marshal(format!("unknown dtype code {}", code)))?;
        Ok(Self { handle, len, dtype })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn null_count(&self) -> Result<usize> {
        into_len(unsafe { carrow_array_null_count(self.handle.as_ptr()?) })
    }

    pub fn is_null(&self, i: usize) -> Result<bool> {
        self.check_bounds(i)?;
        into_bool(unsafe { carrow_array_is_null(self.handle.as_ptr()?, i as i64) })
    }

    fn check_bounds(&self, i: usize) -> Result<()> {
        if i >= self.len {
            return Err(CarrowError::Bounds {
                index: i,
                length: self.len,
            });
        }
        Ok(())
    }

    fn check(&self, i: usize, expected: DType) -> Result<i64> {
        if self.dtype != expected {
            return Err(CarrowError::TypeMismatch(format!(
                "{} getter called on a {} array",
                expected, self.dtype
            )));
        }
        self.check_bounds(i)?;
        Ok(i as i64)
    }

    pub fn bool_at(&self, i: usize) -> Result<bool> {
        let i = self.check(i, DType::Bool)?;
        into_bool(unsafe { carrow_array_bool_at(self.handle.as_ptr()?, i) })
    }

    pub fn int64_at(&self, i: usize) -> Result<i64> {
        let i = self.check(i, DType::Int64)?;
        into_int(unsafe { carrow_array_int_at(self.handle.as_ptr()?, i) })
    }

    pub fn float64_at(&self, i: usize) -> Result<f64> {
        let i = self.check(i, DType::Float64)?;
        into_float(unsafe { carrow_array_float_at(self.handle.as_ptr()?, i) })
    }

    /// Returns an owned copy of the string at `i`.
    pub fn string_at(&self, i: usize) -> Result<String> {
        let i = self.check(i, DType::String)?;
        into_string(unsafe { carrow_array_str_at(self.handle.as_ptr()?, i) })
    }

    /// Returns the timestamp at `i` as a UTC instant, exact to the nanosecond.
    pub fn time_at(&self, i: usize) -> Result<DateTime<Utc>> {
        let i = self.check(i, DType::Timestamp)?;
        let nanos = into_int(unsafe { carrow_array_timestamp_at(self.handle.as_ptr()?, i) })?;
        Ok(Utc.timestamp_nanos(nanos))
    }

    /// Returns another reference to the same native array.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            len: self.len,
            dtype: self.dtype,
        })
    }

    pub(crate) fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn close(mut self) -> Result<()> {
        self.handle.release()
    }
}
