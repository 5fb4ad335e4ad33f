// In: src/table/mod.rs

//! Columns and tables.
//!
//! A `Table` is validated before it is handed back: any handle the native side
//! returns passes `carrow_table_validate` first, and a failure releases it
//! instead of leaking a half-usable table to the caller.

mod column;
#[cfg(test)]
mod tests;

pub use column::Column;

use crate::array::Array;
use crate::descriptors::{Field, Metadata, Schema};
use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::table::*;
use crate::result::{into_handle, into_len, into_string, into_unit};

/// A row-aligned, ordered collection of columns sharing one schema.
#[derive(Debug)]
pub struct Table {
    handle: NativeHandle,
    num_rows: usize,
    num_cols: usize,
}

impl Table {
    /// Builds a table whose schema is derived from the columns' fields, in order.
    pub fn from_columns(columns: &[Column]) -> Result<Self> {
        let schema = Schema::new(columns.iter().map(Column::field))?;
        let arrays: Vec<&Array> = columns.iter().map(Column::array).collect();
        Self::build(&schema, &arrays)
    }

    /// Builds a table from an existing schema and one array per field.
    pub fn from_arrays(schema: &Schema, arrays: &[Array]) -> Result<Self> {
        let arrays: Vec<&Array> = arrays.iter().collect();
        Self::build(schema, &arrays)
    }

    fn build(schema: &Schema, arrays: &[&Array]) -> Result<Self> {
        let list = into_handle(carrow_arrays_new(), "array list")?;
        for array in arrays {
            into_unit(unsafe { carrow_arrays_append(list.as_ptr()?, array.handle().as_ptr()?) })?;
        }
        let res = unsafe { carrow_table_new(schema.handle().as_ptr()?, list.as_ptr()?) };
        Self::from_handle(into_handle(res, "table")?)
    }

    /// Adopts a native table after validating it.
    pub(crate) fn from_handle(mut handle: NativeHandle) -> Result<Self> {
        let ptr = handle.as_ptr()?;
        if let Err(e) = into_unit(unsafe { carrow_table_validate(ptr) }) {
            handle.release()?;
            return Err(e);
        }
        let num_rows = into_len(unsafe { carrow_table_num_rows(ptr) })?;
        let num_cols = into_len(unsafe { carrow_table_num_cols(ptr) })?;
        Ok(Self {
            handle,
            num_rows,
            num_cols,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn schema(&self) -> Result<Schema> {
        let res = unsafe { carrow_table_schema(self.handle.as_ptr()?) };
        Schema::from_handle(into_handle(res, "schema")?)
    }

    pub fn metadata(&self) -> Result<Metadata> {
        self.schema()?.metadata()
    }

    fn check_column(&self, i: usize) -> Result<i64> {
        if i >= self.num_cols {
            return Err(CarrowError::Bounds {
                index: i,
                length: self.num_cols,
            });
        }
        Ok(i as i64)
    }

    pub fn field(&self, i: usize) -> Result<Field> {
        let i = self.check_column(i)?;
        let res = unsafe { carrow_table_field(self.handle.as_ptr()?, i) };
        Field::from_handle(into_handle(res, "field")?)
    }

    pub fn column(&self, i: usize) -> Result<Array> {
        let i = self.check_column(i)?;
        let res = unsafe { carrow_table_column(self.handle.as_ptr()?, i) };
        Array::from_handle(into_handle(res, "array")?)
    }

    /// Looks a column up by exact name. With duplicate names the first wins.
    pub fn column_by_name(&self, name: &str) -> Result<Array> {
        let res = unsafe { carrow_table_column_by_name(self.handle.as_ptr()?, name.as_ptr(), name.len()) };
        Array::from_handle(into_handle(res, "array")?)
    }

    pub fn column_name(&self, i: usize) -> Result<String> {
        let i = self.check_column(i)?;
        into_string(unsafe { carrow_table_column_name(self.handle.as_ptr()?, i) })
    }

    pub fn column_names(&self) -> Result<Vec<String>> {
        (0..self.num_cols).map(|i| self.column_name(i)).collect()
    }

    /// Returns a zero-copy view of `length` rows starting at `offset`; `None`
    /// means "to the end". The window is clamped to the table, so an
    /// out-of-range slice is empty rather than an error.
    pub fn slice(&self, offset: usize, length: Option<usize>) -> Result<Self> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let length = length.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let res = unsafe { carrow_table_slice(self.handle.as_ptr()?, offset, length) };
        Self::from_handle(into_handle(res, "table")?)
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            num_rows: self.num_rows,
            num_cols: self.num_cols,
        })
    }

    pub(crate) fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    pub fn close(mut self) -> Result<()> {
        self.handle.release()
    }
}
