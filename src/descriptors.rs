// In: src/descriptors.rs

//! Fields, schemas and metadata: the native-owned descriptions of what a
//! column or a table looks like.

use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::descriptors::*;
use crate::result::{into_handle, into_int, into_len, into_optional_handle, into_string, into_unit};
use crate::types::DType;

//==================================================================================
// 1. Field
//==================================================================================

/// A named, typed column descriptor. Name and dtype are read once and cached.
#[derive(Debug)]
pub struct Field {
    handle: NativeHandle,
    name: String,
    dtype: DType,
}

impl Field {
    pub fn new(name: &str, dtype: DType) -> Result<Self> {
        Self::from_dtype_code(name, dtype.code())
    }

    /// Creates a field from a raw dtype code. Codes the engine doesn't know
    /// produce no field and fail with `Creation`.
    pub fn from_dtype_code(name: &str, code: i32) -> Result<Self> {
        let res = unsafe { carrow_field_new(name.as_ptr(), name.len(), code) };
        match into_optional_handle(res, "field")? {
            Some(handle) => Self::from_handle(handle),
            None => Err(CarrowError::Creation(format!("field {:?} with dtype code {}", name, code))),
        }
    }

    pub(crate) fn from_handle(handle: NativeHandle) -> Result<Self> {
        let ptr = handle.as_ptr()?;
        let name = into_string(unsafe { carrow_field_name(ptr) })?;
        let code = into_int(unsafe { carrow_field_dtype(ptr) })?;
        let dtype = i32::try_from(code)
            .ok()
            .and_then(DType::from_code)
            .ok_or_else(|| CarrowError::Marshal(format!("unknown dtype code {}", code)))?;
        Ok(Self { handle, name, dtype })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns another reference to the same native field.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            name: self.name.clone(),
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

//==================================================================================
// 2. Metadata
//==================================================================================

/// Ordered, append-only key/value pairs. Duplicate keys are kept in order.
#[derive(Debug)]
pub struct Metadata {
    handle: NativeHandle,
}

impl Metadata {
    pub fn new() -> Result<Self> {
        Ok(Self {
            handle: into_handle(carrow_meta_new(), "metadata")?,
        })
    }

    pub(crate) fn from_handle(handle: NativeHandle) -> Self {
        Self { handle }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        into_unit(unsafe {
            carrow_meta_set(
                self.handle.as_ptr()?,
                key.as_ptr(),
                key.len(),
                value.as_ptr(),
                value.len(),
            )
        })
    }

    pub fn len(&self) -> Result<usize> {
        into_len(unsafe { carrow_meta_size(self.handle.as_ptr()?) })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn check_index(&self, i: usize) -> Result<()> {
        let length = self.len()?;
        if i >= length {
            return Err(CarrowError::Bounds { index: i, length });
        }
        Ok(())
    }

    pub fn key(&self, i: usize) -> Result<String> {
        self.check_index(i)?;
        into_string(unsafe { carrow_meta_key(self.handle.as_ptr()?, i as i64) })
    }

    pub fn value(&self, i: usize) -> Result<String> {
        self.check_index(i)?;
        into_string(unsafe { carrow_meta_value(self.handle.as_ptr()?, i as i64) })
    }

    /// All pairs, in insertion order.
    pub fn pairs(&self) -> Result<Vec<(String, String)>> {
        (0..self.len()?)
            .map(|i| Ok((self.key(i)?, self.value(i)?)))
            .collect()
    }

    pub(crate) fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn close(mut self) -> Result<()> {
        self.handle.release()
    }
}

//==================================================================================
// 3. Schema
//==================================================================================

/// An ordered list of fields plus optional metadata.
#[derive(Debug)]
pub struct Schema {
    handle: NativeHandle,
    num_fields: usize,
}

impl Schema {
    /// Builds a schema from `fields`, in order. The fields stay usable.
    pub fn new<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Result<Self> {
        let list = into_handle(carrow_fields_new(), "field list")?;
        for field in fields {
            into_unit(unsafe { carrow_fields_append(list.as_ptr()?, field.handle().as_ptr()?) })?;
        }
        let handle = into_handle(unsafe { carrow_schema_new(list.as_ptr()?) }, "schema")?;
        Self::from_handle(handle)
    }

    pub(crate) fn from_handle(handle: NativeHandle) -> Result<Self> {
        let num_fields = into_len(unsafe { carrow_schema_num_fields(handle.as_ptr()?) })?;
        Ok(Self { handle, num_fields })
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub fn field(&self, i: usize) -> Result<Field> {
        if i >= self.num_fields {
            return Err(CarrowError::Bounds {
                index: i,
                length: self.num_fields,
            });
        }
        let res = unsafe { carrow_schema_field(self.handle.as_ptr()?, i as i64) };
        Field::from_handle(into_handle(res, "field")?)
    }

    pub fn fields(&self) -> Result<Vec<Field>> {
        (0..self.num_fields).map(|i| self.field(i)).collect()
    }

    /// Returns a copy of the attached metadata (empty if none).
    pub fn metadata(&self) -> Result<Metadata> {
        let res = unsafe { carrow_schema_meta(self.handle.as_ptr()?) };
        Ok(Metadata::from_handle(into_handle(res, "metadata")?))
    }

    /// Attaches `meta`, replacing any previous metadata. The native side
    /// produces a new schema; this value switches to it and releases the old one.
    pub fn set_metadata(&mut self, meta: &Metadata) -> Result<()> {
        let res = unsafe { carrow_schema_set_meta(self.handle.as_ptr()?, meta.handle().as_ptr()?) };
        let updated = into_handle(res, "schema")?;
        let mut previous = std::mem::replace(&mut self.handle, updated);
        previous.release()
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            num_fields: self.num_fields,
        })
    }

    pub(crate) fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn close(mut self) -> Result<()> {
        self.handle.release()
    }
}
