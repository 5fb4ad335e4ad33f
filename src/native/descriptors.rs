// In: src/native/descriptors.rs

//! Native entry points for fields, field lists, schemas and metadata.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;

use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};

use super::result::{NativeResult, StatusCode};
use super::{guard, into_raw, object_mut, object_ref, str_arg, KeyValueMetadata, NativeError, NativeObject};
use crate::types::DType;

/// Schema metadata key holding the ordered key/value pairs as a JSON array.
pub(crate) const METADATA_KEY: &str = "carrow.metadata";

//==================================================================================
// 1. Metadata Encoding
//==================================================================================

/// Packs ordered metadata into the arrow schema metadata map.
pub(crate) fn encode_metadata(meta: &KeyValueMetadata) -> Result<HashMap<String, String>, NativeError> {
    let json = serde_json::to_string(meta)
        .map_err(|e| NativeError::invalid(format!("can't encode metadata: {}", e)))?;
    let mut map = HashMap::with_capacity(1);
    map.insert(METADATA_KEY.to_string(), json);
    Ok(map)
}

/// Unpacks ordered metadata. Schemas written by other producers have no ordering
/// information, so their entries come back sorted by key.
pub(crate) fn decode_metadata(map: &HashMap<String, String>) -> Result<KeyValueMetadata, NativeError> {
    if let Some(json) = map.get(METADATA_KEY) {
        return serde_json::from_str(json)
            .map_err(|e| NativeError::invalid(format!("corrupt schema metadata: {}", e)));
    }
    let mut pairs: KeyValueMetadata = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    pairs.sort();
    Ok(pairs)
}

/// Returns the dtype code of a field, rejecting arrow types the engine doesn't produce.
pub(crate) fn field_dtype(field: &Field) -> Result<DType, NativeError> {
    DType::from_arrow_type(field.data_type()).ok_or_else(|| {
        NativeError::new(
            StatusCode::TypeError,
            format!("unsupported data type {} for field {}", field.data_type(), field.name()),
        )
    })
}

//==================================================================================
// 2. Fields
//==================================================================================

/// Creates a field. An unknown dtype code yields a null object, not an error.
///
/// # Safety
/// `name` must be valid for `name_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_field_new(name: *const u8, name_len: usize, dtype: i32) -> NativeResult {
    guard(|| {
        let Some(dtype) = DType::from_code(dtype) else {
            return Ok(NativeResult::ok());
        };
        let name = str_arg(name, name_len)?;
        let field: FieldRef = Arc::new(Field::new(name, dtype.to_arrow_type(), true));
        Ok(NativeResult::object(into_raw(NativeObject::Field(field))))
    })
}

/// # Safety
/// `field` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_field_name(field: *const c_void) -> NativeResult {
    guard(|| {
        let field = object_ref(field)?.as_field()?;
        Ok(NativeResult::bytes(field.name().as_bytes().to_vec()))
    })
}

/// # Safety
/// `field` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_field_dtype(field: *const c_void) -> NativeResult {
    guard(|| {
        let field = object_ref(field)?.as_field()?;
        Ok(NativeResult::int(field_dtype(field)?.code() as i64))
    })
}

#[no_mangle]
pub extern "C" fn carrow_fields_new() -> NativeResult {
    guard(|| Ok(NativeResult::object(into_raw(NativeObject::FieldList(Vec::new())))))
}

/// Appends a shared reference to `field` to the list.
///
/// # Safety
/// Both pointers must be live object pointers.
#[no_mangle]
pub unsafe extern "C" fn carrow_fields_append(list: *mut c_void, field: *const c_void) -> NativeResult {
    guard(|| {
        let field = Arc::clone(object_ref(field)?.as_field()?);
        match object_mut(list)? {
            NativeObject::FieldList(fields) => {
                fields.push(field);
                Ok(NativeResult::ok())
            }
            other => Err(NativeError::new(
                StatusCode::TypeError,
                format!("expected field list, got {}", other.kind()),
            )),
        }
    })
}

//==================================================================================
// 3. Schemas
//==================================================================================

/// Builds a schema from a field list. The list stays owned by the caller.
///
/// # Safety
/// `list` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_schema_new(list: *const c_void) -> NativeResult {
    guard(|| match object_ref(list)? {
        NativeObject::FieldList(fields) => {
            let schema: SchemaRef = Arc::new(Schema::new(fields.clone()));
            Ok(NativeResult::object(into_raw(NativeObject::Schema(schema))))
        }
        other => Err(NativeError::new(
            StatusCode::TypeError,
            format!("expected field list, got {}", other.kind()),
        )),
    })
}

/// # Safety
/// `schema` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_schema_num_fields(schema: *const c_void) -> NativeResult {
    guard(|| {
        let schema = object_ref(schema)?.as_schema()?;
        Ok(NativeResult::int(schema.fields().len() as i64))
    })
}

/// # Safety
/// `schema` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_schema_field(schema: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let schema = object_ref(schema)?.as_schema()?;
        let fields = schema.fields();
        let field = usize::try_from(i)
            .ok()
            .and_then(|i| fields.get(i))
            .ok_or_else(|| {
                NativeError::new(
                    StatusCode::IndexError,
                    format!("field index {} out of bounds for {} fields", i, fields.len()),
                )
            })?;
        Ok(NativeResult::object(into_raw(NativeObject::Field(Arc::clone(field)))))
    })
}

/// Returns a copy of the schema's metadata as a new metadata object.
///
/// # Safety
/// `schema` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_schema_meta(schema: *const c_void) -> NativeResult {
    guard(|| {
        let schema = object_ref(schema)?.as_schema()?;
        let meta = decode_metadata(schema.metadata())?;
        Ok(NativeResult::object(into_raw(NativeObject::Metadata(meta))))
    })
}

/// Returns a new schema with the same fields and `meta` attached. The input
/// schema is left untouched; the caller should switch to the returned one.
///
/// # Safety
/// Both pointers must be live object pointers.
#[no_mangle]
pub unsafe extern "C" fn carrow_schema_set_meta(schema: *const c_void, meta: *const c_void) -> NativeResult {
    guard(|| {
        let schema = object_ref(schema)?.as_schema()?;
        let meta = object_ref(meta)?.as_metadata()?;
        let updated = Schema::new_with_metadata(schema.fields().clone(), encode_metadata(meta)?);
        Ok(NativeResult::object(into_raw(NativeObject::Schema(Arc::new(updated)))))
    })
}

//==================================================================================
// 4. Metadata
//==================================================================================

#[no_mangle]
pub extern "C" fn carrow_meta_new() -> NativeResult {
    guard(|| Ok(NativeResult::object(into_raw(NativeObject::Metadata(Vec::new())))))
}

/// Appends a key/value pair. Duplicate keys are kept.
///
/// # Safety
/// `meta` must be a live object pointer; key/value must be valid for their lengths.
#[no_mangle]
pub unsafe extern "C" fn carrow_meta_set(
    meta: *mut c_void,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> NativeResult {
    guard(|| {
        let key = str_arg(key, key_len)?.to_string();
        let value = str_arg(value, value_len)?.to_string();
        match object_mut(meta)? {
            NativeObject::Metadata(pairs) => {
                pairs.push((key, value));
                Ok(NativeResult::ok())
            }
            other => Err(NativeError::new(
                StatusCode::TypeError,
                format!("expected metadata, got {}", other.kind()),
            )),
        }
    })
}

/// # Safety
/// `meta` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_meta_size(meta: *const c_void) -> NativeResult {
    guard(|| Ok(NativeResult::int(object_ref(meta)?.as_metadata()?.len() as i64)))
}

fn meta_entry(meta: &KeyValueMetadata, i: i64) -> Result<&(String, String), NativeError> {
    usize::try_from(i).ok().and_then(|i| meta.get(i)).ok_or_else(|| {
        NativeError::new(
            StatusCode::IndexError,
            format!("metadata index {} out of bounds for {} entries", i, meta.len()),
        )
    })
}

/// # Safety
/// `meta` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_meta_key(meta: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let (key, _) = meta_entry(object_ref(meta)?.as_metadata()?, i)?;
        Ok(NativeResult::bytes(key.as_bytes().to_vec()))
    })
}

/// # Safety
/// `meta` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_meta_value(meta: *const c_void, i: i64) -> NativeResult {
    guard(|| {
        let (_, value) = meta_entry(object_ref(meta)?.as_metadata()?, i)?;
        Ok(NativeResult::bytes(value.as_bytes().to_vec()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::carrow_object_free;
    use crate::native::result::carrow_error_free;

    #[test]
    fn test_unknown_dtype_is_absent_not_error() {
        let name = "x";
        let res = unsafe { carrow_field_new(name.as_ptr(), name.len(), 42) };
        assert!(res.ptr.is_null());
        assert!(res.err.is_null());
    }

    #[test]
    fn test_metadata_survives_schema_encoding_in_order() {
        let meta: KeyValueMetadata = vec![
            ("z".into(), "1".into()),
            ("a".into(), "2".into()),
            ("z".into(), "3".into()),
        ];
        let map = encode_metadata(&meta).unwrap();
        assert_eq!(decode_metadata(&map).unwrap(), meta);
    }

    #[test]
    fn test_foreign_metadata_is_sorted() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        let decoded = decode_metadata(&map).unwrap();
        assert_eq!(decoded, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
    }

    #[test]
    fn test_meta_index_out_of_range() {
        let meta = carrow_meta_new();
        let res = unsafe { carrow_meta_key(meta.ptr, 0) };
        assert_eq!(StatusCode::from_code(res.int), StatusCode::IndexError);
        unsafe {
            carrow_error_free(res.err);
            carrow_object_free(meta.ptr);
        }
    }
}
