// In: src/builder.rs

//! Buffered array builders.
//!
//! One generic `ArrayBuilder<T>` replaces a hand-written builder per dtype. The
//! per-type parts (buffered representation, bulk native append) live in the
//! `BuilderValue` impls below. Values accumulate in a host-side buffer and are
//! handed to the native builder in bulk whenever the buffer fills, so the
//! boundary is crossed once per `capacity` values instead of once per value.

use std::ffi::c_void;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};

use crate::array::Array;
use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::builder::*;
use crate::native::result::NativeResult;
use crate::result::{into_handle, into_unit};
use crate::types::DType;

/// Default flush threshold, in values.
pub const BUILDER_CAPACITY: usize = 4096;

//==================================================================================
// 1. Per-Type Contract
//==================================================================================

/// A value type a builder can hold.
pub trait BuilderValue: Sized {
    const DTYPE: DType;

    /// How a value sits in the host buffer until the next flush.
    type Slot;

    fn to_slot(self) -> Result<Self::Slot>;

    /// Bulk-appends `slots` to the native builder.
    ///
    /// # Safety
    /// `builder` must be a live native builder of dtype `Self::DTYPE`.
    unsafe fn flush(builder: *mut c_void, slots: &[Self::Slot]) -> NativeResult;
}

impl BuilderValue for bool {
    const DTYPE: DType = DType::Bool;
    type Slot = u8;

    fn to_slot(self) -> Result<u8> {
        Ok(self as u8)
    }

    unsafe fn flush(builder: *mut c_void, slots: &[u8]) -> NativeResult {
        carrow_builder_append_bools(builder, slots.as_ptr(), slots.len())
    }
}

impl BuilderValue for i64 {
    const DTYPE: DType = DType::Int64;
    type Slot = i64;

    fn to_slot(self) -> Result<i64> {
        Ok(self)
    }

    unsafe fn flush(builder: *mut c_void, slots: &[i64]) -> NativeResult {
        carrow_builder_append_ints(builder, slots.as_ptr(), slots.len())
    }
}

impl BuilderValue for f64 {
    const DTYPE: DType = DType::Float64;
    type Slot = f64;

    fn to_slot(self) -> Result<f64> {
        Ok(self)
    }

    unsafe fn flush(builder: *mut c_void, slots: &[f64]) -> NativeResult {
        carrow_builder_append_floats(builder, slots.as_ptr(), slots.len())
    }
}

impl BuilderValue for String {
    const DTYPE: DType = DType::String;
    type Slot = String;

    fn to_slot(self) -> Result<String> {
        Ok(self)
    }

    /// The native side copies the bytes; the buffered strings are dropped by
    /// the caller once the flush succeeds.
    unsafe fn flush(builder: *mut c_void, slots: &[String]) -> NativeResult {
        let ptrs: Vec<*const u8> = slots.iter().map(|s| s.as_ptr()).collect();
        let lens: Vec<usize> = slots.iter().map(String::len).collect();
        carrow_builder_append_strings(builder, ptrs.as_ptr(), lens.as_ptr(), slots.len())
    }
}

impl BuilderValue for DateTime<Utc> {
    const DTYPE: DType = DType::Timestamp;
    type Slot = i64;

    /// Nanoseconds since the epoch; instants outside 1677..2262 don't fit.
    fn to_slot(self) -> Result<i64> {
        self.timestamp_nanos_opt().ok_or_else(|| {
            CarrowError::Append(format!("timestamp {} is outside the nanosecond range", self))
        })
    }

    unsafe fn flush(builder: *mut c_void, slots: &[i64]) -> NativeResult {
        carrow_builder_append_timestamps(builder, slots.as_ptr(), slots.len())
    }
}

//==================================================================================
// 2. The Builder
//==================================================================================

/// A single-use, buffered writer producing one immutable `Array`.
///
/// Not thread-safe: a builder has exactly one writer. `finish` consumes it,
/// so reuse after finishing doesn't compile.
pub struct ArrayBuilder<T: BuilderValue> {
    handle: NativeHandle,
    buffer: Vec<T::Slot>,
    capacity: usize,
    len: usize,
    _marker: PhantomData<T>,
}

pub type BoolArrayBuilder = ArrayBuilder<bool>;
pub type Int64ArrayBuilder = ArrayBuilder<i64>;
pub type Float64ArrayBuilder = ArrayBuilder<f64>;
pub type StringArrayBuilder = ArrayBuilder<String>;
pub type TimestampArrayBuilder = ArrayBuilder<DateTime<Utc>>;

impl<T: BuilderValue> ArrayBuilder<T> {
    pub fn new() -> Result<Self> {
        Self::with_capacity(BUILDER_CAPACITY)
    }

    /// Creates a builder that flushes every `capacity` values.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CarrowError::InvalidOption("builder capacity must be at least 1".into()));
        }
        let handle = into_handle(carrow_builder_new(T::DTYPE.code()), "array builder")?;
        Ok(Self {
            handle,
            buffer: Vec::with_capacity(capacity),
            capacity,
            len: 0,
            _marker: PhantomData,
        })
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Values appended so far, flushed or not.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buffers `value`, flushing to the native builder once `capacity` values
    /// are pending. A value whose flush fails is not kept.
    pub fn append<V: Into<T>>(&mut self, value: V) -> Result<()> {
        self.buffer.push(value.into().to_slot()?);
        if self.buffer.len() >= self.capacity {
            if let Err(e) = self.flush() {
                self.buffer.pop();
                return Err(e);
            }
        }
        self.len += 1;
        Ok(())
    }

    pub fn extend<V: Into<T>, I: IntoIterator<Item = V>>(&mut self, values: I) -> Result<()> {
        values.into_iter().try_for_each(|v| self.append(v))
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        into_unit(unsafe { T::flush(self.handle.as_ptr()?, &self.buffer) })?;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes what's left and seals the native builder into an `Array`.
    pub fn finish(mut self) -> Result<Array> {
        self.flush()?;
        let res = unsafe { carrow_builder_finish(self.handle.as_ptr()?) };
        let array = Array::from_handle(into_handle(res, "array")?)?;
        log::debug!("finished {} array with {} values", T::DTYPE, self.len);
        Ok(array)
    }
}
