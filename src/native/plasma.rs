// In: src/native/plasma.rs

//! Native object store connection. Tables cross the socket as arrow IPC
//! stream bytes; schema metadata (including ordered key/value pairs) rides
//! along in the IPC schema message.

use std::ffi::c_void;
use std::io::Cursor;
use std::os::unix::net::UnixStream;
use std::sync::{Mutex, MutexGuard};

use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;

use super::result::{NativeResult, StatusCode};
use super::table::make_table;
use super::{bytes_arg, guard, into_raw, object_ref, str_arg, NativeError, NativeObject};
use crate::store::protocol::{ObjectKey, Request, Response, ID_LEN};

/// One client socket. `None` once disconnected.
pub(crate) struct StoreConnection {
    stream: Mutex<Option<UnixStream>>,
}

impl StoreConnection {
    fn stream(&self) -> MutexGuard<'_, Option<UnixStream>> {
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn round_trip(&self, request: &Request) -> Result<Response, NativeError> {
        let mut slot = self.stream();
        let stream = slot
            .as_mut()
            .ok_or_else(|| NativeError::new(StatusCode::Connection, "store connection is closed"))?;
        request.write_to(stream).map_err(io_error)?;
        Response::read_from(stream).map_err(io_error)
    }

    fn disconnect(&self) -> Result<bool, NativeError> {
        let Some(mut stream) = self.stream().take() else {
            return Ok(false);
        };
        Request::Disconnect.write_to(&mut stream).map_err(io_error)?;
        Response::read_from(&mut stream).map_err(io_error)?;
        Ok(true)
    }
}

fn io_error(err: std::io::Error) -> NativeError {
    NativeError::new(StatusCode::IoError, format!("store I/O error: {}", err))
}

fn expect_ok(response: Response) -> Result<(), NativeError> {
    match response {
        Response::Ok => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> NativeError {
    match response {
        Response::Error(msg) => NativeError::invalid(msg),
        Response::Timeout(msg) => NativeError::new(StatusCode::Timeout, msg),
        other => NativeError::invalid(format!("unexpected store response {:?}", other)),
    }
}

unsafe fn object_key(id: *const u8) -> Result<ObjectKey, NativeError> {
    let bytes = bytes_arg(id, ID_LEN);
    bytes
        .try_into()
        .map_err(|_| NativeError::invalid("null object id"))
}

unsafe fn connection<'a>(conn: *const c_void) -> Result<&'a StoreConnection, NativeError> {
    object_ref(conn)?.as_connection()
}

//==================================================================================
// 1. IPC Encoding
//==================================================================================

pub(crate) fn encode_table(table: &RecordBatch) -> Result<Vec<u8>, NativeError> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, table.schema_ref())?;
        writer.write(table)?;
        writer.finish()?;
    }
    Ok(buf)
}

/// Decodes an IPC stream into one table, concatenating batches column by column.
pub(crate) fn decode_table(bytes: &[u8]) -> Result<RecordBatch, NativeError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let mut batches = reader.collect::<Result<Vec<_>, _>>()?;
    if batches.len() == 1 {
        if let Some(batch) = batches.pop() {
            return Ok(batch);
        }
    }
    let arrays = (0..schema.fields().len())
        .map(|c| {
            let parts: Vec<_> = batches.iter().map(|b| b.column(c).as_ref()).collect();
            if parts.is_empty() {
                return Ok(arrow::array::new_empty_array(schema.field(c).data_type()));
            }
            arrow::compute::concat(&parts)
        })
        .collect::<Result<Vec<_>, _>>()?;
    make_table(schema, arrays)
}

//==================================================================================
// 2. Entry Points
//==================================================================================

/// # Safety
/// `path` must be valid for `path_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_plasma_connect(path: *const u8, path_len: usize) -> NativeResult {
    guard(|| {
        let path = str_arg(path, path_len)?;
        let stream = UnixStream::connect(path).map_err(|e| {
            NativeError::new(
                StatusCode::Connection,
                format!("can't connect to store at {}: {}", path, e),
            )
        })?;
        log::debug!("native: connected to store at {}", path);
        let conn = StoreConnection {
            stream: Mutex::new(Some(stream)),
        };
        Ok(NativeResult::object(into_raw(NativeObject::Connection(conn))))
    })
}

/// Seals `table` under the 20-byte `id`. Returns the encoded size in `int`.
///
/// # Safety
/// `conn` and `table` must be live object pointers; `id` valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_plasma_write(conn: *const c_void, table: *const c_void, id: *const u8) -> NativeResult {
    guard(|| {
        let conn = connection(conn)?;
        let table = object_ref(table)?.as_table()?;
        let id = object_key(id)?;
        let data = encode_table(table)?;
        let size = data.len() as i64;
        expect_ok(conn.round_trip(&Request::Put { id, data })?)?;
        Ok(NativeResult::int(size))
    })
}

/// Blocks up to `timeout_ms` for the object, then decodes it into a table.
///
/// # Safety
/// `conn` must be a live object pointer; `id` valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_plasma_read(conn: *const c_void, id: *const u8, timeout_ms: i64) -> NativeResult {
    guard(|| {
        let conn = connection(conn)?;
        let id = object_key(id)?;
        let timeout_ms = u64::try_from(timeout_ms)
            .map_err(|_| NativeError::invalid(format!("negative timeout {} ms", timeout_ms)))?;
        match conn.round_trip(&Request::Get { id, timeout_ms })? {
            Response::Data(bytes) => {
                let table = decode_table(&bytes)?;
                Ok(NativeResult::object(into_raw(NativeObject::Table(table))))
            }
            other => Err(unexpected(other)),
        }
    })
}

/// Deletes the object from the store.
///
/// # Safety
/// `conn` must be a live object pointer; `id` valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_plasma_release(conn: *const c_void, id: *const u8) -> NativeResult {
    guard(|| {
        let conn = connection(conn)?;
        let id = object_key(id)?;
        expect_ok(conn.round_trip(&Request::Delete { id })?)?;
        Ok(NativeResult::ok())
    })
}

/// # Safety
/// `conn` must be a live object pointer; `id` valid for 20 bytes.
#[no_mangle]
pub unsafe extern "C" fn carrow_plasma_contains(conn: *const c_void, id: *const u8) -> NativeResult {
    guard(|| {
        let conn = connection(conn)?;
        let id = object_key(id)?;
        match conn.round_trip(&Request::Contains { id })? {
            Response::Bool(found) => Ok(NativeResult::int(found as i64)),
            other => Err(unexpected(other)),
        }
    })
}

/// Closes the socket. Returns `int = 1` if this call closed it, `0` if it was
/// already closed.
///
/// # Safety
/// `conn` must be a live object pointer.
#[no_mangle]
pub unsafe extern "C" fn carrow_plasma_disconnect(conn: *const c_void) -> NativeResult {
    guard(|| {
        let closed = connection(conn)?.disconnect()?;
        if closed {
            log::debug!("native: store connection closed");
        }
        Ok(NativeResult::int(closed as i64))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample(range: std::ops::Range<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("n", DataType::Int64, true),
            Field::new("s", DataType::Utf8, true),
        ]));
        let n: ArrayRef = Arc::new(Int64Array::from_iter_values(range.clone()));
        let s: ArrayRef = Arc::new(StringArray::from_iter_values(range.map(|i| format!("v{}", i))));
        RecordBatch::try_new(schema, vec![n, s]).unwrap()
    }

    #[test]
    fn test_ipc_round_trip_keeps_schema_and_rows() {
        let table = sample(0..10);
        let decoded = decode_table(&encode_table(&table).unwrap()).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_multi_batch_stream_is_concatenated() {
        let first = sample(0..3);
        let second = sample(3..5);
        let mut buf = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buf, first.schema_ref()).unwrap();
            writer.write(&first).unwrap();
            writer.write(&second).unwrap();
            writer.finish().unwrap();
        }
        let decoded = decode_table(&buf).unwrap();
        assert_eq!(decoded, sample(0..5));
    }
}
