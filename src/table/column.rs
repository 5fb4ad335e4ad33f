// In: src/table/column.rs

use crate::array::Array;
use crate::descriptors::Field;
use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::table::{carrow_column_array, carrow_column_field, carrow_column_new};
use crate::result::into_handle;
use crate::types::DType;

/// A field paired with an array of the same dtype.
#[derive(Debug)]
pub struct Column {
    handle: NativeHandle,
    field: Field,
    array: Array,
}

impl Column {
    /// Pairs `field` with `array`. Fails with `TypeMismatch` when their dtypes
    /// differ; no column is produced in that case.
    pub fn new(field: &Field, array: &Array) -> Result<Self> {
        if field.dtype() != array.dtype() {
            return Err(CarrowError::TypeMismatch(format!(
                "column {:?}: array dtype {} doesn't match field dtype {}",
                field.name(),
                array.dtype(),
                field.dtype()
            )));
        }
        let res = unsafe { carrow_column_new(field.handle().as_ptr()?, array.handle().as_ptr()?) };
        let handle = into_handle(res, "column")?;

        let ptr = handle.as_ptr()?;
        let field = Field::from_handle(into_handle(unsafe { carrow_column_field(ptr) }, "field")?)?;
        let array = Array::from_handle(into_handle(unsafe { carrow_column_array(ptr) }, "array")?)?;
        Ok(Self { handle, field, array })
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn dtype(&self) -> DType {
        self.field.dtype()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn close(self) -> Result<()> {
        let Column { mut handle, field, array } = self;
        field.close()?;
        array.close()?;
        handle.release()
    }
}
