// In: src/native/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Native Engine Layer
// ====================================================================================
//
// Everything under `native` plays the role of the external columnar engine. It owns
// all column data (built on `arrow`) and is reachable only through `extern "C"`
// functions that take opaque pointers and return a `NativeResult`.
//
//   [Host wrapper (Field, Array, Table, Client, ...)]
//         |
//         `-> holds a `NativeHandle` (one native reference)
//         `-> calls `carrow_*` with the raw pointer
//         |
//   [carrow_* entry point]
//         |
//         `-> `guard` catches panics, runs the body
//         `-> body downcasts the pointer through `NativeObject` (tag-checked)
//         `-> returns payload or (status code, message)
//         |
//   [Host `result::unmarshal`] -> copies/frees the error, maps the status code
//
// Every native object is a boxed `NativeObject`. Immutable objects hold `Arc`s (or
// `RecordBatch`, which is itself reference counted), so `carrow_object_retain`
// hands out another reference cheaply. `carrow_object_free` drops one reference.
// ====================================================================================

pub(crate) mod builder;
pub(crate) mod csv;
pub(crate) mod descriptors;
pub(crate) mod plasma;
pub mod result;
pub(crate) mod table;

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{FieldRef, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use builder::NativeBuilder;
use plasma::StoreConnection;
use result::{NativeResult, StatusCode};

/// Ordered, duplicate-preserving key/value metadata.
pub(crate) type KeyValueMetadata = Vec<(String, String)>;

/// A column: a field paired with an array of the same dtype.
#[derive(Debug)]
pub(crate) struct NativeColumn {
    pub field: FieldRef,
    pub array: ArrayRef,
}

/// The tagged representation of every object handed to the host.
pub(crate) enum NativeObject {
    Field(FieldRef),
    FieldList(Vec<FieldRef>),
    Schema(SchemaRef),
    Metadata(KeyValueMetadata),
    Builder(NativeBuilder),
    Array(ArrayRef),
    ArrayList(Vec<ArrayRef>),
    Column(Arc<NativeColumn>),
    Table(RecordBatch),
    Connection(StoreConnection),
}

//==================================================================================
// 1. Native Error Plumbing
//==================================================================================

/// An error raised inside a native entry point, converted to a `NativeResult` at the boundary.
#[derive(Debug)]
pub(crate) struct NativeError {
    pub code: StatusCode,
    pub message: String,
}

impl NativeError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Invalid, message)
    }
}

impl From<ArrowError> for NativeError {
    fn from(err: ArrowError) -> Self {
        let code = match err {
            ArrowError::IoError(..) => StatusCode::IoError,
            ArrowError::InvalidArgumentError(_) => StatusCode::Validation,
            _ => StatusCode::Invalid,
        };
        NativeError::new(code, err.to_string())
    }
}

pub(crate) type NativeOutcome = std::result::Result<NativeResult, NativeError>;

/// Runs a native entry point body. Panics never cross the boundary; they are
/// reported as an `Invalid` error instead.
pub(crate) fn guard<F>(body: F) -> NativeResult
where
    F: FnOnce() -> NativeOutcome,
{
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(res)) => res,
        Ok(Err(err)) => NativeResult::error(err.code, err.message),
        Err(panic_info) => {
            let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            log::error!("native engine panicked: {}", msg);
            NativeResult::error(StatusCode::Invalid, format!("native engine panicked: {}", msg))
        }
    }
}

//==================================================================================
// 2. Object Access
//==================================================================================

pub(crate) fn into_raw(obj: NativeObject) -> *mut c_void {
    Box::into_raw(Box::new(obj)) as *mut c_void
}

/// Borrows the object behind `ptr`.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by this module.
pub(crate) unsafe fn object_ref<'a>(ptr: *const c_void) -> Result<&'a NativeObject, NativeError> {
    (ptr as *const NativeObject)
        .as_ref()
        .ok_or_else(|| NativeError::invalid("null object"))
}

/// Mutably borrows the object behind `ptr`.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by this module, with no other
/// borrow active.
pub(crate) unsafe fn object_mut<'a>(ptr: *mut c_void) -> Result<&'a mut NativeObject, NativeError> {
    (ptr as *mut NativeObject)
        .as_mut()
        .ok_or_else(|| NativeError::invalid("null object"))
}

/// Borrows a host-provided `(ptr, len)` byte argument.
///
/// # Safety
/// `ptr` must be valid for `len` bytes for the duration of the call, or null with `len == 0`.
pub(crate) unsafe fn bytes_arg<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        return &[];
    }
    std::slice::from_raw_parts(ptr, len)
}

/// Borrows a host-provided `(ptr, len)` UTF-8 string argument.
///
/// # Safety
/// Same as `bytes_arg`.
pub(crate) unsafe fn str_arg<'a>(ptr: *const u8, len: usize) -> Result<&'a str, NativeError> {
    std::str::from_utf8(bytes_arg(ptr, len))
        .map_err(|e| NativeError::invalid(format!("invalid UTF-8 argument: {}", e)))
}

fn wrong_kind(expected: &str, actual: &NativeObject) -> NativeError {
    NativeError::new(
        StatusCode::TypeError,
        format!("expected {}, got {}", expected, actual.kind()),
    )
}

impl NativeObject {
    pub fn kind(&self) -> &'static str {
        match self {
            NativeObject::Field(_) => "field",
            NativeObject::FieldList(_) => "field list",
            NativeObject::Schema(_) => "schema",
            NativeObject::Metadata(_) => "metadata",
            NativeObject::Builder(_) => "array builder",
            NativeObject::Array(_) => "array",
            NativeObject::ArrayList(_) => "array list",
            NativeObject::Column(_) => "column",
            NativeObject::Table(_) => "table",
            NativeObject::Connection(_) => "store connection",
        }
    }

    pub fn as_field(&self) -> Result<&FieldRef, NativeError> {
        match self {
            NativeObject::Field(f) => Ok(f),
            other => Err(wrong_kind("field", other)),
        }
    }

    pub fn as_schema(&self) -> Result<&SchemaRef, NativeError> {
        match self {
            NativeObject::Schema(s) => Ok(s),
            other => Err(wrong_kind("schema", other)),
        }
    }

    pub fn as_metadata(&self) -> Result<&KeyValueMetadata, NativeError> {
        match self {
            NativeObject::Metadata(m) => Ok(m),
            other => Err(wrong_kind("metadata", other)),
        }
    }

    pub fn as_array(&self) -> Result<&ArrayRef, NativeError> {
        match self {
            NativeObject::Array(a) => Ok(a),
            other => Err(wrong_kind("array", other)),
        }
    }

    pub fn as_column(&self) -> Result<&Arc<NativeColumn>, NativeError> {
        match self {
            NativeObject::Column(c) => Ok(c),
            other => Err(wrong_kind("column", other)),
        }
    }

    pub fn as_table(&self) -> Result<&RecordBatch, NativeError> {
        match self {
            NativeObject::Table(t) => Ok(t),
            other => Err(wrong_kind("table", other)),
        }
    }

    pub fn as_connection(&self) -> Result<&StoreConnection, NativeError> {
        match self {
            NativeObject::Connection(c) => Ok(c),
            other => Err(wrong_kind("store connection", other)),
        }
    }

    /// Hands out another reference to immutable data. Mutable objects can't be shared.
    fn retain(&self) -> Result<NativeObject, NativeError> {
        match self {
            NativeObject::Field(f) => Ok(NativeObject::Field(Arc::clone(f))),
            NativeObject::Schema(s) => Ok(NativeObject::Schema(Arc::clone(s))),
            NativeObject::Array(a) => Ok(NativeObject::Array(Arc::clone(a))),
            NativeObject::Column(c) => Ok(NativeObject::Column(Arc::clone(c))),
            NativeObject::Table(t) => Ok(NativeObject::Table(t.clone())),
            other => Err(NativeError::invalid(format!(
                "{} can't be shared",
                other.kind()
            ))),
        }
    }
}

//==================================================================================
// 3. Lifecycle Entry Points
//==================================================================================

/// Returns a new reference to the same immutable native object.
///
/// # Safety
/// `ptr` must be null or a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_object_retain(ptr: *const c_void) -> NativeResult {
    guard(|| {
        let obj = object_ref(ptr)?;
        Ok(NativeResult::object(into_raw(obj.retain()?)))
    })
}

/// Drops one reference to a native object. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or a live object pointer that is not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn carrow_object_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    drop(Box::from_raw(ptr as *mut NativeObject));
}
