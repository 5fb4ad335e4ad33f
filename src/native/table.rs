// In: src/native/table.rs

//! Native entry points for arrays, columns and tables.
//!
//! A table is an arrow `RecordBatch`: slicing it only adjusts offsets on the
//! shared column buffers, so slices never copy data.

use std::ffi::c_void;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{Float64Type, Int64Type, SchemaRef, TimestampNanosecondType};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::descriptors::field_dtype;
use super::result::{NativeResult, StatusCode};
use super::{guard, into_raw, object_mut, object_ref, str_arg, NativeColumn, NativeError, NativeObject};
use crate::types::DType;

//==================================================================================
// 1. Validation Helpers
//==================================================================================

fn checked_index(len: usize, i: i64, what: &str) -> Result<usize, NativeError> {
    usize::try_from(i).ok().filter(|&i| i < len).ok_or_else(|| {
        NativeError::new(
            StatusCode::IndexError,
            format!("{} index {} out of bounds for length {}", what, i, len),
        )
    })
}

fn validation(message: String) -> NativeError {
    NativeError::new(StatusCode::Validation, message)
}

/// Checks that `arrays` line up with `schema`: same arity, matching dtypes,
/// one shared row count. Returns the row count.
pub(crate) fn validate_parts(schema: &SchemaRef, arrays: &[ArrayRef]) -> Result<usize, NativeError> {
    let fields = schema.fields();
    if fields.len() != arrays.len() {
        return Err(validation(format!(
            "schema has {} fields but {} columns were given",
            fields.len(),
            arrays.len()
        )));
    }

    let num_rows = arrays.first().map_or(0, |a| a.len());
    for (i, (field, array)) in fields.iter().zip(arrays).enumerate() {
        if DType::from_arrow_type(field.data_type()).is_none() {
            return Err(validation(format!(
                "column {} ({}): unsupported data type {}",
                i,
                field.name(),
                field.data_type()
            )));
        }
        if field.data_type() != array.data_type() {
            return Err(validation(format!(
                "column {} ({}): field type {} doesn't match array type {}",
                i,
                field.name(),
                field.data_type(),
                array.data_type()
            )));
        }
        if array.len() != num_rows {
            return Err(validation(format!(
                "column {} ({}) has {} rows, expected {}",
                i,
                field.name(),
                array.len(),
                num_rows
            )));
        }
    }
    Ok(num_rows)
}

/// Assembles a validated record batch. A table without columns has no rows.
pub(crate) fn make_table(schema: SchemaRef, arrays: Vec<ArrayRef>) -> Result<RecordBatch, NativeError> {
    let num_rows = validate_parts(&schema, &arrays)?;
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

/// Clamps a slice window to the table: `offset` saturates at `num_rows`, a
/// negative `length` means "to the end".
pub(crate) fn clamp_window(num_rows: usize, offset: usize, length: i64) -> (usize, usize) {
    let offset = offset.min(num_rows);
    let remaining = num_rows - offset;
    let length = if length < 0 {
        remaining
    } else {
        usize::try_from(length).unwrap_or(usize::MAX).min(remaining)
    };
    (offset, length)
}

//==================================================================================
// 2. Arrays
//==================================================================================

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_length(array: *const c_void) -> NativeResult {
    guard(|| Ok(NativeResult::int(object_ref(array)?.as_array()?.len() as i64)))
}

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_dtype(array: *const c_void) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let dtype = DType::from_arrow_type(array.data_type()).ok_or_else(|| {
            NativeError::new(
                StatusCode::TypeError,
                format!("unsupported array type {}", array.data_type()),
            )
        })?;
        Ok(NativeResult::int(dtype.code() as i64))
    })
}

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_null_count(array: *const c_void) -> NativeResult {
    guard(|| Ok(NativeResult::int(object_ref(array)?.as_array()?.null_count() as i64)))
}

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_is_null(array: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let i = checked_index(array.len(), i, "array")?;
        Ok(NativeResult::int(array.is_null(i) as i64))
    })
}

fn type_error(expected: &str, array: &ArrayRef) -> NativeError {
    NativeError::new(
        StatusCode::TypeError,
        format!("expected {} array, got {}", expected, array.data_type()),
    )
}

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_bool_at(array: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let typed = array.as_boolean_opt().ok_or_else(|| type_error("bool", array))?;
        let i = checked_index(typed.len(), i, "array")?;
        Ok(NativeResult::int(typed.value(i) as i64))
    })
}

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_int_at(array: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let typed = array
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(|| type_error("int64", array))?;
        let i = checked_index(typed.len(), i, "array")?;
        Ok(NativeResult::int(typed.value(i)))
    })
}

/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_float_at(array: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let typed = array
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| type_error("float64", array))?;
        let i = checked_index(typed.len(), i, "array")?;
        Ok(NativeResult::float(typed.value(i)))
    })
}

/// Returns a transient copy of the string at `i`; release it with `carrow_bytes_free`.
///
/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_str_at(array: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let typed = array
            .as_string_opt::<i32>()
            .ok_or_else(|| type_error("string", array))?;
        let i = checked_index(typed.len(), i, "array")?;
        Ok(NativeResult::bytes(typed.value(i).as_bytes().to_vec()))
    })
}

/// Returns nanoseconds since the Unix epoch.
///
/// # Safety
/// `array` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_array_timestamp_at(array: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let array = object_ref(array)?.as_array()?;
        let typed = array
            .as_primitive_opt::<TimestampNanosecondType>()
            .ok_or_else(|| type_error("timestamp", array))?;
        let i = checked_index(typed.len(), i, "array")?;
        Ok(NativeResult::int(typed.value(i)))
    })
}

#[no_mangle]
pub extern "C" fn carrow_arrays_new() -> NativeResult {
    guard(|| Ok(NativeResult::object(into_raw(NativeObject::ArrayList(Vec::new())))))
}

/// # Safety
/// Both pointers must be live object pointers.
#[no_mangle]
pub unsafe extern "C" fn carrow_arrays_append(list: *mut c_void, array: *const c_void) -> NativeResult {
    guard(|| {
        let array = Arc::clone(object_ref(array)?.as_array()?);
        match object_mut(list)? {
            NativeObject::ArrayList(arrays) => {
                arrays.push(array);
                Ok(NativeResult::ok())
            }
            other => Err(NativeError::new(
                StatusCode::TypeError,
                format!("expected array list, got {}", other.kind()),
            )),
        }
    })
}

//==================================================================================
// 3. Columns
//==================================================================================

/// Pairs a field with an array. The dtypes must agree.
///
/// # Safety
/// Both pointers must be live object pointers.
#[no_mangle]
pub unsafe extern "C" fn carrow_column_new(field: *const c_void, array: *const c_void) -> NativeResult {
    guard(|| {
        let field = object_ref(field)?.as_field()?;
        let array = object_ref(array)?.as_array()?;
        if field.data_type() != array.data_type() {
            return Err(NativeError::new(
                StatusCode::TypeError,
                format!(
                    "column type {} doesn't match field type {}",
                    array.data_type(),
                    field.data_type()
                ),
            ));
        }
        let column = NativeColumn {
            field: Arc::clone(field),
            array: Arc::clone(array),
        };
        Ok(NativeResult::object(into_raw(NativeObject::Column(Arc::new(column)))))
    })
}

/// # Safety
/// `column` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_column_field(column: *const c_void) -> NativeResult {
    guard(|| {
        let column = object_ref(column)?.as_column()?;
        Ok(NativeResult::object(into_raw(NativeObject::Field(Arc::clone(&column.field)))))
    })
}

/// # Safety
/// `column` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_column_array(column: *const c_void) -> NativeResult {
    guard(|| {
        let column = object_ref(column)?.as_column()?;
        Ok(NativeResult::object(into_raw(NativeObject::Array(Arc::clone(&column.array)))))
    })
}

/// # Safety
/// `column` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_column_dtype(column: *const c_void) -> NativeResult {
    guard(|| {
        let column = object_ref(column)?.as_column()?;
        Ok(NativeResult::int(field_dtype(&column.field)?.code() as i64))
    })
}

//==================================================================================
// 4. Tables
//==================================================================================

/// Builds a table from a schema and an array list, validating before anything
/// is handed back.
///
/// # Safety
/// Both pointers must be live object pointers.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_new(schema: *const c_void, arrays: *const c_void) -> NativeResult {
    guard(|| {
        let schema = Arc::clone(object_ref(schema)?.as_schema()?);
        let arrays = match object_ref(arrays)? {
            NativeObject::ArrayList(arrays) => arrays.clone(),
            other => {
                return Err(NativeError::new(
                    StatusCode::TypeError,
                    format!("expected array list, got {}", other.kind()),
                ))
            }
        };
        let batch = make_table(schema, arrays)?;
        log::debug!(
            "native: table created ({} rows x {} columns)",
            batch.num_rows(),
            batch.num_columns()
        );
        Ok(NativeResult::object(into_raw(NativeObject::Table(batch))))
    })
}

/// Re-checks the table invariants. Tables read from text or from the store go
/// through this before the host accepts them.
///
/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_validate(table: *const c_void) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        let num_rows = validate_parts(table.schema_ref(), table.columns())?;
        if table.num_columns() > 0 && num_rows != table.num_rows() {
            return Err(validation(format!(
                "table reports {} rows but its columns have {}",
                table.num_rows(),
                num_rows
            )));
        }
        Ok(NativeResult::ok())
    })
}

/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_num_rows(table: *const c_void) -> NativeResult {
    guard(|| Ok(NativeResult::int(object_ref(table)?.as_table()?.num_rows() as i64)))
}

/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_num_cols(table: *const c_void) -> NativeResult {
    guard(|| Ok(NativeResult::int(object_ref(table)?.as_table()?.num_columns() as i64)))
}

/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_schema(table: *const c_void) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        Ok(NativeResult::object(into_raw(NativeObject::Schema(table.schema()))))
    })
}

/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_field(table: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        let i = checked_index(table.num_columns(), i, "column")?;
        let field = Arc::clone(&table.schema_ref().fields()[i]);
        Ok(NativeResult::object(into_raw(NativeObject::Field(field))))
    })
}

/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_column(table: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        let i = checked_index(table.num_columns(), i, "column")?;
        Ok(NativeResult::object(into_raw(NativeObject::Array(Arc::clone(table.column(i))))))
    })
}

/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_column_name(table: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        let i = checked_index(table.num_columns(), i, "column")?;
        let name = table.schema_ref().field(i).name();
        Ok(NativeResult::bytes(name.as_bytes().to_vec()))
    })
}

/// Looks a column up by exact (case-sensitive) name; the first match wins.
///
/// # Safety
/// `table` must be a live object pointer; `name` valid for `name_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_column_by_name(table: *const c_void, name: *const u8, name_len: usize) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        let name = str_arg(name, name_len)?;
        let position = table
            .schema_ref()
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| {
                NativeError::new(StatusCode::KeyError, format!("column not found: {}", name))
            })?;
        Ok(NativeResult::object(into_raw(NativeObject::Array(Arc::clone(
            table.column(position),
        )))))
    })
}

/// Returns a zero-copy view of `length` rows starting at `offset`. The window
/// is clamped to the table (see `clamp_window`); a negative `length` means "to the end".
///
/// # Safety
/// `table` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_table_slice(table: *const c_void, offset: i64, length: i64) -> NativeResult {
    guard(|| {
        let table = object_ref(table)?.as_table()?;
        let offset = usize::try_from(offset)
            .map_err(|_| NativeError::invalid(format!("negative slice offset {}", offset)))?;
        let (offset, length) = clamp_window(table.num_rows(), offset, length);
        Ok(NativeResult::object(into_raw(NativeObject::Table(table.slice(offset, length)))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};

    fn schema(types: &[DataType]) -> SchemaRef {
        let fields: Vec<Field> = types
            .iter()
            .enumerate()
            .map(|(i, t)| Field::new(format!("c{}", i), t.clone(), true))
            .collect();
        Arc::new(Schema::new(fields))
    }

    #[test]
    fn test_validate_rejects_row_count_mismatch() {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(Float64Array::from(vec![1.0, 2.0])),
        ];
        let err = validate_parts(&schema(&[DataType::Int64, DataType::Float64]), &arrays).unwrap_err();
        assert_eq!(err.code, StatusCode::Validation);
        assert!(err.message.contains("has 2 rows, expected 3"));
    }

    #[test]
    fn test_validate_rejects_arity_mismatch() {
        let arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![1]))];
        let err = validate_parts(&schema(&[DataType::Int64, DataType::Int64]), &arrays).unwrap_err();
        assert!(err.message.contains("2 fields but 1 columns"));
    }

    #[test]
    fn test_empty_table_has_no_rows() {
        let batch = make_table(schema(&[]), vec![]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn test_clamp_window() {
        assert_eq!(clamp_window(117, 10, 37), (10, 37));
        assert_eq!(clamp_window(117, 10, -1), (10, 107));
        assert_eq!(clamp_window(117, 100, 50), (100, 17));
        assert_eq!(clamp_window(117, 500, 5), (117, 0));
        assert_eq!(clamp_window(0, 0, -1), (0, 0));
    }
}
