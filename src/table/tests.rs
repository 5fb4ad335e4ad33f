// In: src/table/tests.rs

use super::*;
use crate::builder::{ArrayBuilder, BuilderValue, Float64ArrayBuilder, Int64ArrayBuilder, StringArrayBuilder};
use crate::types::DType;

const ROWS: usize = 117;

fn int_array(n: usize) -> Array {
    let mut b = Int64ArrayBuilder::new().unwrap();
    b.extend((0..n as i64).map(|i| i * 10)).unwrap();
    b.finish().unwrap()
}

fn float_array(n: usize) -> Array {
    let mut b = Float64ArrayBuilder::new().unwrap();
    b.extend((0..n).map(|i| i as f64 + 0.5)).unwrap();
    b.finish().unwrap()
}

fn column(name: &str, array: Array) -> Column {
    let field = Field::new(name, array.dtype()).unwrap();
    Column::new(&field, &array).unwrap()
}

/// The two-column, 117-row table most tests start from.
fn sample_table() -> Table {
    let columns = vec![column("intCol", int_array(ROWS)), column("floatCol", float_array(ROWS))];
    Table::from_columns(&columns).unwrap()
}

fn one_value_array<T: BuilderValue>(value: T) -> Array {
    let mut b = ArrayBuilder::<T>::new().unwrap();
    b.append(value).unwrap();
    b.finish().unwrap()
}

fn array_of(dtype: DType) -> Array {
    match dtype {
        DType::Bool => one_value_array(true),
        DType::Int64 => one_value_array(1i64),
        DType::Float64 => one_value_array(1.0f64),
        DType::String => one_value_array(String::from("x")),
        DType::Timestamp => one_value_array(chrono::Utc::now()),
    }
}

//==================================================================================
// Construction
//==================================================================================

#[test]
fn test_table_from_columns() {
    let table = sample_table();
    assert_eq!(table.num_rows(), ROWS);
    assert_eq!(table.num_cols(), 2);
    assert_eq!(table.column_names().unwrap(), vec!["intCol", "floatCol"]);
    assert_eq!(table.field(1).unwrap().dtype(), DType::Float64);
    assert_eq!(table.column(0).unwrap().int64_at(116).unwrap(), 1160);
}

#[test]
fn test_column_rejects_every_dtype_mismatch() {
    for field_dtype in DType::ALL {
        for array_dtype in DType::ALL {
            let field = Field::new("c", field_dtype).unwrap();
            let array = array_of(array_dtype);
            let result = Column::new(&field, &array);
            if field_dtype == array_dtype {
                let column = result.unwrap();
                assert_eq!(column.dtype(), field_dtype);
                assert_eq!(column.name(), "c");
                assert_eq!(column.len(), 1);
            } else {
                assert!(
                    matches!(result, Err(CarrowError::TypeMismatch(_))),
                    "{} field accepted a {} array",
                    field_dtype,
                    array_dtype
                );
            }
        }
    }
}

#[test]
fn test_row_count_mismatch_fails_validation() {
    let columns = vec![column("a", int_array(3)), column("b", float_array(4))];
    let err = Table::from_columns(&columns).unwrap_err();
    assert!(matches!(err, CarrowError::Validation(_)));
    assert!(err.to_string().contains("has 4 rows, expected 3"), "{}", err);
}

#[test]
fn test_arity_mismatch_fails_validation() {
    let fields = vec![Field::new("a", DType::Int64).unwrap(), Field::new("b", DType::Int64).unwrap()];
    let schema = Schema::new(&fields).unwrap();
    let err = Table::from_arrays(&schema, &[int_array(5)]).unwrap_err();
    assert!(matches!(err, CarrowError::Validation(_)));
}

#[test]
fn test_from_arrays_checks_dtypes_against_schema() {
    let fields = vec![Field::new("a", DType::String).unwrap()];
    let schema = Schema::new(&fields).unwrap();
    let err = Table::from_arrays(&schema, &[int_array(5)]).unwrap_err();
    assert!(matches!(err, CarrowError::Validation(_)));
}

#[test]
fn test_empty_table() {
    let table = Table::from_columns(&[]).unwrap();
    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.num_cols(), 0);
    assert!(table.column_names().unwrap().is_empty());
}

#[test]
fn test_table_carries_schema_metadata() {
    let fields = vec![Field::new("a", DType::Int64).unwrap()];
    let mut schema = Schema::new(&fields).unwrap();
    let mut meta = Metadata::new().unwrap();
    meta.set("unit", "ms").unwrap();
    schema.set_metadata(&meta).unwrap();

    let table = Table::from_arrays(&schema, &[int_array(2)]).unwrap();
    let pairs = table.metadata().unwrap().pairs().unwrap();
    assert_eq!(pairs, vec![("unit".to_string(), "ms".to_string())]);
}

//==================================================================================
// Lookup
//==================================================================================

#[test]
fn test_column_by_name() {
    let table = sample_table();
    let floats = table.column_by_name("floatCol").unwrap();
    assert_eq!(floats.float64_at(3).unwrap(), 3.5);

    let err = table.column_by_name("floatcol").unwrap_err();
    assert!(matches!(err, CarrowError::NotFound(_)));
}

#[test]
fn test_duplicate_names_resolve_to_first_column() {
    let mut strings = StringArrayBuilder::new().unwrap();
    strings.extend(["first", "second"]).unwrap();
    let columns = vec![column("dup", strings.finish().unwrap()), column("dup", int_array(2))];
    let table = Table::from_columns(&columns).unwrap();
    let found = table.column_by_name("dup").unwrap();
    assert_eq!(found.dtype(), DType::String);
}

#[test]
fn test_column_index_out_of_bounds() {
    let table = sample_table();
    assert!(matches!(table.column(2), Err(CarrowError::Bounds { index: 2, length: 2 })));
    assert!(matches!(table.field(9), Err(CarrowError::Bounds { .. })));
}

//==================================================================================
// Slicing
//==================================================================================

#[test]
fn test_slice_is_a_shifted_view() {
    let table = sample_table();
    let slice = table.slice(10, Some(37)).unwrap();
    assert_eq!(slice.num_rows(), 37);
    assert_eq!(slice.column_names().unwrap(), table.column_names().unwrap());

    let (parent_ints, slice_ints) = (table.column(0).unwrap(), slice.column(0).unwrap());
    let (parent_floats, slice_floats) = (table.column(1).unwrap(), slice.column(1).unwrap());
    for i in 0..37 {
        assert_eq!(slice_ints.int64_at(i).unwrap(), parent_ints.int64_at(i + 10).unwrap());
        assert_eq!(slice_floats.float64_at(i).unwrap(), parent_floats.float64_at(i + 10).unwrap());
    }
}

#[test]
fn test_slice_outlives_parent() {
    let table = sample_table();
    let slice = table.slice(100, None).unwrap();
    table.close().unwrap();
    assert_eq!(slice.num_rows(), 17);
    assert_eq!(slice.column(0).unwrap().int64_at(0).unwrap(), 1000);
}

#[test]
fn test_out_of_range_slice_is_clamped() {
    let table = sample_table();
    assert_eq!(table.slice(100, Some(50)).unwrap().num_rows(), 17);
    assert_eq!(table.slice(ROWS, None).unwrap().num_rows(), 0);

    let empty = table.slice(500, Some(5)).unwrap();
    assert_eq!(empty.num_rows(), 0);
    assert_eq!(empty.column_names().unwrap(), vec!["intCol", "floatCol"]);
}

#[test]
fn test_concurrent_reads_of_overlapping_slices() {
    let table = sample_table();
    let slices: Vec<Table> = (0..4).map(|k| table.slice(k * 20, Some(40)).unwrap()).collect();
    std::thread::scope(|s| {
        for (k, slice) in slices.iter().enumerate() {
            s.spawn(move || {
                let ints = slice.column(0).unwrap();
                for i in 0..slice.num_rows() {
                    assert_eq!(ints.int64_at(i).unwrap(), ((k * 20 + i) * 10) as i64);
                }
            });
        }
    });
}
