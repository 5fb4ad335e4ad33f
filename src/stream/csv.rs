// In: src/stream/csv.rs

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::callbacks::callbacks;
use super::registry::registry;
use crate::config::{ascii_byte, CsvOptions};
use crate::error::{CarrowError, Result};
use crate::native::csv::{carrow_csv_read, ParseOptionsC, ReadOptionsC};
use crate::result::into_handle;
use crate::table::Table;

/// Keeps a stream registered for the duration of one native call and
/// releases it on every exit path.
struct Registration(i64);

impl Drop for Registration {
    fn drop(&mut self) {
        if let Err(e) = registry().release(self.0) {
            log::warn!("stream {} was already released: {}", self.0, e);
        }
    }
}

fn native_parse_options(options: &CsvOptions) -> Result<ParseOptionsC> {
    let parse = &options.parse;
    Ok(ParseOptionsC {
        delimiter: ascii_byte("delimiter", parse.delimiter)?,
        quoting: parse.quoting,
        quote_char: ascii_byte("quote_char", parse.quote_char)?,
        double_quote: parse.double_quote,
        escaping: parse.escaping,
        escape_char: ascii_byte("escape_char", parse.escape_char)?,
        newlines_in_values: parse.newlines_in_values,
        ignore_empty_lines: parse.ignore_empty_lines,
    })
}

/// Parses delimited text from `reader` into a table.
///
/// The reader is registered with the stream bridge and the native engine
/// pulls bytes from it through callbacks, possibly from worker threads.
/// The registration is dropped before this returns, success or not.
pub fn read_csv<R>(reader: R, options: &CsvOptions) -> Result<Table>
where
    R: Read + Send + 'static,
{
    options.validate()?;
    let parse = native_parse_options(options)?;

    let read = &options.read;
    let name_ptrs: Vec<*const u8> = read.column_names.iter().map(|n| n.as_ptr()).collect();
    let name_lens: Vec<usize> = read.column_names.iter().map(String::len).collect();
    let read = ReadOptionsC {
        use_threads: read.use_threads,
        block_size: i64::from(read.block_size),
        skip_rows: i64::from(read.skip_rows),
        autogenerate_column_names: read.autogenerate_column_names,
        column_names: name_ptrs.as_ptr(),
        column_name_lens: name_lens.as_ptr(),
        num_column_names: name_ptrs.len(),
    };

    let registration = Registration(registry().alloc(Box::new(reader)));
    let res = unsafe { carrow_csv_read(registration.0, callbacks(), &read, &parse) };
    drop(registration);

    let table = Table::from_handle(into_handle(res, "table")?)?;
    log::debug!("read {} rows x {} columns of delimited text", table.num_rows(), table.num_cols());
    Ok(table)
}

/// Opens `path` and parses it with `read_csv`.
pub fn read_csv_file(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        CarrowError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
    })?;
    read_csv(BufReader::new(file), options)
}
