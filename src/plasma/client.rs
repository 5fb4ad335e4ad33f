// In: src/plasma/client.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::ObjectId;
use crate::error::{CarrowError, Result};
use crate::handle::NativeHandle;
use crate::native::plasma::*;
use crate::result::{into_bool, into_handle, into_len, into_unit};
use crate::table::Table;

/// A connection to an object store that holds whole tables keyed by `ObjectId`.
///
/// `disconnect` is idempotent; every other operation on a disconnected client
/// fails with `Disconnected`. Dropping a connected client disconnects it.
#[derive(Debug)]
pub struct Client {
    conn: Option<NativeHandle>,
    path: PathBuf,
}

impl Client {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = path
            .to_str()
            .ok_or_else(|| CarrowError::Connection(format!("store path {} is not UTF-8", path.display())))?;
        let res = unsafe { carrow_plasma_connect(text.as_ptr(), text.len()) };
        let conn = into_handle(res, "store connection")?;
        log::info!("connected to object store at {}", path.display());
        Ok(Self {
            conn: Some(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&self) -> Result<&NativeHandle> {
        self.conn.as_ref().ok_or(CarrowError::Disconnected)
    }

    /// Seals `table` in the store under `id`. Returns the stored size in bytes.
    /// Writing an id that already exists is an error.
    pub fn write_table(&self, table: &Table, id: &ObjectId) -> Result<usize> {
        let res = unsafe {
            carrow_plasma_write(
                self.conn()?.as_ptr()?,
                table.handle().as_ptr()?,
                id.as_bytes().as_ptr(),
            )
        };
        let size = into_len(res)?;
        log::debug!("wrote table {} ({} rows, {} bytes)", id, table.num_rows(), size);
        Ok(size)
    }

    /// Waits up to `timeout` for `id` to appear, then reads it back. A missed
    /// deadline is a `Timeout` error, never an empty table.
    pub fn read_table(&self, id: &ObjectId, timeout: Duration) -> Result<Table> {
        let res = unsafe {
            carrow_plasma_read(self.conn()?.as_ptr()?, id.as_bytes().as_ptr(), timeout_millis(timeout))
        };
        Table::from_handle(into_handle(res, "table")?)
    }

    /// Deletes `id` from the store.
    pub fn release(&self, id: &ObjectId) -> Result<()> {
        into_unit(unsafe { carrow_plasma_release(self.conn()?.as_ptr()?, id.as_bytes().as_ptr()) })
    }

    pub fn contains(&self, id: &ObjectId) -> Result<bool> {
        into_bool(unsafe { carrow_plasma_contains(self.conn()?.as_ptr()?, id.as_bytes().as_ptr()) })
    }

    /// Closes the connection. Calling it again is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let closed = into_unit(unsafe { carrow_plasma_disconnect(conn.as_ptr()?) });
        conn.release()?;
        log::info!("disconnected from object store at {}", self.path.display());
        closed
    }
}

/// Whole milliseconds for the store, rounded up so a nonzero wait never becomes 0.
fn timeout_millis(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i64::MAX)
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.conn.is_some() {
            log::warn!("client for {} dropped while connected; disconnecting", self.path.display());
            if let Err(e) = self.disconnect() {
                log::warn!("disconnect on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_rounds_up_to_whole_millis() {
        assert_eq!(timeout_millis(Duration::ZERO), 0);
        assert_eq!(timeout_millis(Duration::from_nanos(1)), 1);
        assert_eq!(timeout_millis(Duration::from_micros(500)), 1);
        assert_eq!(timeout_millis(Duration::from_millis(50)), 50);
        assert_eq!(timeout_millis(Duration::from_micros(50_001)), 51);
        assert_eq!(timeout_millis(Duration::MAX), i64::MAX);
    }
}
