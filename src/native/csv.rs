// In: src/native/csv.rs

//! Native delimited-text reader.
//!
//! The engine never sees a host reader directly. It receives an integer stream
//! handle plus a `StreamCallbacks` table and calls back into the host for every
//! block of bytes it needs:
//!
//!   carrow_csv_read(handle, callbacks, options)
//!     |-> pump:  read(handle, buf, block_size) until closed(handle)
//!     |          tell(handle) cross-checked against the bytes received
//!     |-> scan:  blank-line and embedded-newline rules
//!     |-> parse: `csv` tokenizer, column naming
//!     `-> build: per-column dtype inference + arrow arrays

use std::ffi::{c_char, CStr};
use std::sync::Arc;
use std::thread;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampNanosecondBuilder,
};
use arrow::datatypes::{Field, Schema};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use super::result::{NativeResult, StatusCode};
use super::table::make_table;
use super::{bytes_arg, guard, into_raw, NativeError, NativeObject};
use crate::types::DType;

//==================================================================================
// 1. ABI Types
//==================================================================================

/// What a stream callback hands back: a size/position/flag, or an error string
/// allocated by the host and released through `StreamCallbacks::free_err`.
#[repr(C)]
#[derive(Debug)]
pub struct StreamResult {
    pub size: i64,
    pub err: *mut c_char,
}

pub type ReadCallback = unsafe extern "C" fn(handle: i64, out: *mut u8, size: i64) -> StreamResult;
pub type TellCallback = unsafe extern "C" fn(handle: i64) -> StreamResult;
pub type ClosedCallback = unsafe extern "C" fn(handle: i64) -> StreamResult;
pub type FreeErrCallback = unsafe extern "C" fn(err: *mut c_char);

/// The host functions the engine may call while a read is in flight. They may
/// be invoked from engine worker threads.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StreamCallbacks {
    pub read: ReadCallback,
    pub tell: TellCallback,
    pub closed: ClosedCallback,
    pub free_err: FreeErrCallback,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ParseOptionsC {
    pub delimiter: u8,
    pub quoting: bool,
    pub quote_char: u8,
    pub double_quote: bool,
    pub escaping: bool,
    pub escape_char: u8,
    pub newlines_in_values: bool,
    pub ignore_empty_lines: bool,
}

/// Read options. `column_names`/`column_name_lens` are parallel arrays of
/// `num_column_names` UTF-8 strings, borrowed for the duration of the call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ReadOptionsC {
    pub use_threads: bool,
    pub block_size: i64,
    pub skip_rows: i64,
    pub autogenerate_column_names: bool,
    pub column_names: *const *const u8,
    pub column_name_lens: *const usize,
    pub num_column_names: usize,
}

/// Owned copy of both option records.
struct Settings {
    parse: ParseOptionsC,
    use_threads: bool,
    block_size: usize,
    skip_rows: usize,
    autogenerate_column_names: bool,
    column_names: Vec<String>,
}

impl Settings {
    unsafe fn from_c(read: &ReadOptionsC, parse: &ParseOptionsC) -> Result<Self, NativeError> {
        if read.block_size <= 0 {
            return Err(NativeError::invalid(format!(
                "block_size must be positive, got {}",
                read.block_size
            )));
        }
        let skip_rows = usize::try_from(read.skip_rows)
            .map_err(|_| NativeError::invalid(format!("negative skip_rows {}", read.skip_rows)))?;

        let mut column_names = Vec::with_capacity(read.num_column_names);
        if read.num_column_names > 0 {
            let ptrs = std::slice::from_raw_parts(read.column_names, read.num_column_names);
            let lens = std::slice::from_raw_parts(read.column_name_lens, read.num_column_names);
            for (&ptr, &len) in ptrs.iter().zip(lens) {
                let name = std::str::from_utf8(bytes_arg(ptr, len))
                    .map_err(|e| NativeError::invalid(format!("invalid UTF-8 column name: {}", e)))?;
                column_names.push(name.to_string());
            }
        }

        Ok(Self {
            parse: *parse,
            use_threads: read.use_threads,
            block_size: read.block_size as usize,
            skip_rows,
            autogenerate_column_names: read.autogenerate_column_names,
            column_names,
        })
    }
}

//==================================================================================
// 2. Stream Pump
//==================================================================================

struct StreamSource {
    handle: i64,
    callbacks: StreamCallbacks,
}

impl StreamSource {
    /// Turns a callback result into a value, copying and releasing any host error.
    unsafe fn check(&self, res: StreamResult, op: &str) -> Result<i64, NativeError> {
        if res.err.is_null() {
            return Ok(res.size);
        }
        let message = CStr::from_ptr(res.err).to_string_lossy().into_owned();
        (self.callbacks.free_err)(res.err);
        Err(NativeError::new(
            StatusCode::IoError,
            format!("stream {} {} failed: {}", self.handle, op, message),
        ))
    }

    unsafe fn tell(&self) -> Result<i64, NativeError> {
        self.check((self.callbacks.tell)(self.handle), "tell")
    }

    unsafe fn closed(&self) -> Result<bool, NativeError> {
        Ok(self.check((self.callbacks.closed)(self.handle), "closed")? != 0)
    }

    /// Drains the stream in `block_size` chunks.
    unsafe fn pump(&self, block_size: usize) -> Result<Vec<u8>, NativeError> {
        let start = self.tell()?;
        let mut data = Vec::new();
        let mut block = vec![0u8; block_size];

        while !self.closed()? {
            let n = self.check(
                (self.callbacks.read)(self.handle, block.as_mut_ptr(), block_size as i64),
                "read",
            )?;
            let n = usize::try_from(n)
                .ok()
                .filter(|&n| n <= block_size)
                .ok_or_else(|| {
                    NativeError::new(
                        StatusCode::IoError,
                        format!("stream {} read returned {} bytes for a {} byte block", self.handle, n, block_size),
                    )
                })?;
            data.extend_from_slice(&block[..n]);

            let position = self.tell()?;
            if position - start != data.len() as i64 {
                return Err(NativeError::new(
                    StatusCode::IoError,
                    format!(
                        "stream {} reports position {} after {} bytes read from {}",
                        self.handle,
                        position,
                        data.len(),
                        start
                    ),
                ));
            }
            if n == 0 {
                break;
            }
        }
        Ok(data)
    }
}

//==================================================================================
// 3. Text Rules & Tokenizing
//==================================================================================

/// The text after the first `rows` lines.
fn skip_lines(text: &str, rows: usize) -> &str {
    let mut rest = text;
    for _ in 0..rows {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

/// Where the scan sits relative to the current field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    /// The byte after an escape char inside a quoted value.
    Escaped,
    /// Just past the quote that may close a quoted value.
    AfterQuote,
}

/// Walks the text once with the `csv` tokenizer's quoting rules and enforces
/// the line rules it doesn't: blank lines and line breaks inside quoted values.
///
/// A quote char opens a quoted value only as the first byte of a field. `\n`,
/// `\r` and `\r\n` all end a line.
fn scan_lines(text: &str, opts: &ParseOptionsC) -> Result<(), NativeError> {
    let bytes = text.as_bytes();
    let mut line = 1usize;
    let mut state = FieldState::Start;
    let mut at_line_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let is_break = b == b'\n' || b == b'\r';
        let crlf = b == b'\r' && bytes.get(i + 1) == Some(&b'\n');

        match state {
            FieldState::Quoted if b == opts.quote_char => state = FieldState::AfterQuote,
            FieldState::Quoted if opts.escaping && b == opts.escape_char => state = FieldState::Escaped,
            FieldState::Quoted | FieldState::Escaped => {
                state = FieldState::Quoted;
                if is_break {
                    if !opts.newlines_in_values {
                        return Err(NativeError::invalid(format!(
                            "CSV parse error: line break inside a quoted value at line {}",
                            line
                        )));
                    }
                    if crlf {
                        i += 1;
                    }
                    line += 1;
                }
            }
            FieldState::AfterQuote if opts.double_quote && b == opts.quote_char => state = FieldState::Quoted,
            _ if is_break => {
                if at_line_start && !opts.ignore_empty_lines {
                    return Err(NativeError::invalid(format!(
                        "CSV parse error: empty line at line {}",
                        line
                    )));
                }
                if crlf {
                    i += 1;
                }
                line += 1;
                at_line_start = true;
                state = FieldState::Start;
            }
            _ if b == opts.delimiter => {
                at_line_start = false;
                state = FieldState::Start;
            }
            FieldState::Start if opts.quoting && b == opts.quote_char => {
                at_line_start = false;
                state = FieldState::Quoted;
            }
            _ => {
                at_line_start = false;
                state = FieldState::Unquoted;
            }
        }
        i += 1;
    }
    Ok(())
}

fn csv_error(err: csv::Error) -> NativeError {
    let code = if err.is_io_error() {
        StatusCode::IoError
    } else {
        StatusCode::Invalid
    };
    NativeError::new(code, format!("CSV parse error: {}", err))
}

fn tokenize(text: &str, opts: &ParseOptionsC) -> Result<Vec<StringRecord>, NativeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .quoting(opts.quoting)
        .quote(opts.quote_char)
        .double_quote(opts.double_quote)
        .escape(opts.escaping.then_some(opts.escape_char))
        .has_headers(false)
        .from_reader(text.as_bytes());

    reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_error)
}

/// Resolves column names and returns them with the data records.
fn split_header(mut records: Vec<StringRecord>, settings: &Settings) -> Result<(Vec<String>, Vec<StringRecord>), NativeError> {
    let names = if !settings.column_names.is_empty() {
        settings.column_names.clone()
    } else if settings.autogenerate_column_names {
        let width = records.first().map_or(0, |r| r.len());
        (0..width).map(|i| format!("f{}", i)).collect()
    } else if records.is_empty() {
        Vec::new()
    } else {
        records.remove(0).iter().map(str::to_string).collect()
    };

    if let Some((row, record)) = records.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
        return Err(NativeError::invalid(format!(
            "CSV parse error: expected {} columns, got {} in data row {}",
            names.len(),
            record.len(),
            row + 1
        )));
    }
    Ok((names, records))
}

//==================================================================================
// 4. Type Inference & Column Building
//==================================================================================

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Parses RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.f]` (UTC) and bare dates into
/// nanoseconds since the epoch.
fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_nanos_opt();
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return naive.and_utc().timestamp_nanos_opt();
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| naive.and_utc().timestamp_nanos_opt())
}

/// Picks the narrowest dtype every non-empty value of the column parses as.
fn infer_dtype(records: &[StringRecord], col: usize) -> DType {
    let mut values = records.iter().map(|r| &r[col]).filter(|v| !v.is_empty()).peekable();
    if values.peek().is_none() {
        return DType::String;
    }
    let values: Vec<&str> = values.collect();
    if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        DType::Int64
    } else if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        DType::Float64
    } else if values.iter().all(|v| parse_bool(v).is_some()) {
        DType::Bool
    } else if values.iter().all(|v| parse_timestamp(v).is_some()) {
        DType::Timestamp
    } else {
        DType::String
    }
}

/// Converts one column. Empty fields become nulls except in string columns.
fn build_column(records: &[StringRecord], col: usize) -> (DType, ArrayRef) {
    let dtype = infer_dtype(records, col);
    let values = records.iter().map(|r| &r[col]);
    let array: ArrayRef = match dtype {
        DType::Int64 => {
            let mut b = Int64Builder::with_capacity(records.len());
            values.for_each(|v| b.append_option(v.parse().ok()));
            Arc::new(b.finish())
        }
        DType::Float64 => {
            let mut b = Float64Builder::with_capacity(records.len());
            values.for_each(|v| b.append_option(v.parse().ok()));
            Arc::new(b.finish())
        }
        DType::Bool => {
            let mut b = BooleanBuilder::with_capacity(records.len());
            values.for_each(|v| b.append_option(parse_bool(v)));
            Arc::new(b.finish())
        }
        DType::Timestamp => {
            let mut b = TimestampNanosecondBuilder::with_capacity(records.len());
            values.for_each(|v| b.append_option(parse_timestamp(v)));
            Arc::new(b.finish())
        }
        DType::String => {
            let mut b = StringBuilder::new();
            values.for_each(|v| b.append_value(v));
            Arc::new(b.finish())
        }
    };
    (dtype, array)
}

fn build_columns(records: &[StringRecord], width: usize, use_threads: bool) -> Result<Vec<(DType, ArrayRef)>, NativeError> {
    let workers = thread::available_parallelism().map_or(1, |n| n.get()).min(width);
    if !use_threads || workers <= 1 {
        return Ok((0..width).map(|c| build_column(records, c)).collect());
    }

    let mut columns: Vec<Option<(DType, ArrayRef)>> = vec![None; width];
    thread::scope(|s| -> Result<(), NativeError> {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                s.spawn(move || {
                    (w..width)
                        .step_by(workers)
                        .map(|c| (c, build_column(records, c)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            let built = handle
                .join()
                .map_err(|_| NativeError::invalid("CSV column worker panicked"))?;
            for (c, column) in built {
                columns[c] = Some(column);
            }
        }
        Ok(())
    })?;
    columns
        .into_iter()
        .map(|c| c.ok_or_else(|| NativeError::invalid("CSV column worker lost a column")))
        .collect()
}

fn parse_table(data: &[u8], settings: &Settings) -> Result<arrow::record_batch::RecordBatch, NativeError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| NativeError::invalid(format!("CSV parse error: invalid UTF-8: {}", e)))?;
    let text = skip_lines(text, settings.skip_rows);
    scan_lines(text, &settings.parse)?;

    let (names, records) = split_header(tokenize(text, &settings.parse)?, settings)?;
    let columns = build_columns(&records, names.len(), settings.use_threads)?;

    let fields: Vec<Field> = names
        .iter()
        .zip(&columns)
        .map(|(name, (dtype, _))| Field::new(name, dtype.to_arrow_type(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    make_table(Arc::new(Schema::new(fields)), arrays)
}

//==================================================================================
// 5. Entry Point
//==================================================================================

/// Reads a whole delimited-text stream into a table, pulling bytes from the
/// host through `callbacks`. The host keeps `handle` registered until this
/// returns.
///
/// # Safety
/// The option pointers must be valid for the call; the callbacks must accept
/// `handle` for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn carrow_csv_read(
    handle: i64,
    callbacks: StreamCallbacks,
    read_options: *const ReadOptionsC,
    parse_options: *const ParseOptionsC,
) -> NativeResult {
    guard(|| {
        let read = read_options.as_ref().ok_or_else(|| NativeError::invalid("null read options"))?;
        let parse = parse_options.as_ref().ok_or_else(|| NativeError::invalid("null parse options"))?;
        let settings = Settings::from_c(read, parse)?;
        let source = StreamSource { handle, callbacks };

        let data = if settings.use_threads {
            let block_size = settings.block_size;
            thread::scope(|s| s.spawn(move || source.pump(block_size)).join())
                .map_err(|_| NativeError::invalid("CSV stream reader panicked"))??
        } else {
            source.pump(settings.block_size)?
        };
        log::debug!("native: read {} bytes of delimited text from stream {}", data.len(), handle);

        let table = parse_table(&data, &settings)?;
        Ok(NativeResult::object(into_raw(NativeObject::Table(table))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::Int64Type;

    fn default_parse() -> ParseOptionsC {
        ParseOptionsC {
            delimiter: b',',
            quoting: true,
            quote_char: b'"',
            double_quote: true,
            escaping: false,
            escape_char: b'\\',
            newlines_in_values: false,
            ignore_empty_lines: true,
        }
    }

    fn settings() -> Settings {
        Settings {
            parse: default_parse(),
            use_threads: false,
            block_size: 16,
            skip_rows: 0,
            autogenerate_column_names: false,
            column_names: Vec::new(),
        }
    }

    #[test]
    fn test_infers_column_types() {
        let data = b"id,score,ok,when,name\n1,1.5,true,2024-01-02,a\n2,,false,2024-01-03 10:00:00,b\n";
        let table = parse_table(data, &settings()).unwrap();
        let types: Vec<_> = table
            .schema()
            .fields()
            .iter()
            .map(|f| DType::from_arrow_type(f.data_type()).unwrap())
            .collect();
        assert_eq!(
            types,
            vec![DType::Int64, DType::Float64, DType::Bool, DType::Timestamp, DType::String]
        );
        assert_eq!(table.column(1).null_count(), 1);
        assert_eq!(table.column(0).as_primitive::<Int64Type>().value(1), 2);
    }

    #[test]
    fn test_blank_lines_follow_option() {
        let data = b"a,b\n1,2\n\n3,4\n";
        let table = parse_table(data, &settings()).unwrap();
        assert_eq!(table.num_rows(), 2);

        let mut strict = settings();
        strict.parse.ignore_empty_lines = false;
        let err = parse_table(data, &strict).unwrap_err();
        assert!(err.message.contains("empty line at line 3"));
    }

    #[test]
    fn test_newline_in_quoted_value_follows_option() {
        let data = b"a,b\n\"x\ny\",2\n";
        let err = parse_table(data, &settings()).unwrap_err();
        assert!(err.message.contains("line break inside a quoted value"));

        let mut relaxed = settings();
        relaxed.parse.newlines_in_values = true;
        let table = parse_table(data, &relaxed).unwrap();
        assert_eq!(table.column(0).as_string::<i32>().value(0), "x\ny");
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let data = b"size,qty\n12\" pipe,2\n3 ft,4\n";
        let table = parse_table(data, &settings()).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column(0).as_string::<i32>().value(0), "12\" pipe");
        assert_eq!(table.column(1).as_primitive::<Int64Type>().value(1), 4);

        // A stray quote must not hide a following blank line.
        let mut strict = settings();
        strict.parse.ignore_empty_lines = false;
        let err = parse_table(b"size,qty\n12\" pipe,2\n\n3 ft,4\n", &strict).unwrap_err();
        assert!(err.message.contains("empty line at line 3"), "{}", err.message);
    }

    #[test]
    fn test_carriage_returns_end_lines() {
        let table = parse_table(b"a,b\r\n1,2\r3,4\r\n", &settings()).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column(1).as_primitive::<Int64Type>().value(1), 4);

        let mut strict = settings();
        strict.parse.ignore_empty_lines = false;
        let err = parse_table(b"a,b\r\n1,2\r\n\r\n3,4\r\n", &strict).unwrap_err();
        assert!(err.message.contains("empty line at line 3"), "{}", err.message);
    }

    #[test]
    fn test_doubled_quote_follows_option() {
        let data = b"a,b\n\"x\"\"y\",1\n";
        let table = parse_table(data, &settings()).unwrap();
        assert_eq!(table.column(0).as_string::<i32>().value(0), "x\"y");

        let mut literal = settings();
        literal.parse.double_quote = false;
        let table = parse_table(data, &literal).unwrap();
        assert_eq!(table.column(0).as_string::<i32>().value(0), "x\"y\"");
    }

    #[test]
    fn test_escape_char_inside_quoted_value() {
        let mut s = settings();
        s.parse.escaping = true;
        let table = parse_table(b"a,b\n\"x\\\"y\",1\n", &s).unwrap();
        assert_eq!(table.column(0).as_string::<i32>().value(0), "x\"y");

        // An escaped line break is still a line break inside a quoted value.
        let err = parse_table(b"a,b\n\"x\\\ny\",1\n", &s).unwrap_err();
        assert!(err.message.contains("line break inside a quoted value at line 2"), "{}", err.message);
    }

    #[test]
    fn test_custom_quote_char() {
        let mut s = settings();
        s.parse.quote_char = b'\'';
        let table = parse_table(b"a,b\n'x,y',2\n", &s).unwrap();
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.column(0).as_string::<i32>().value(0), "x,y");
        assert_eq!(table.column(1).as_primitive::<Int64Type>().value(0), 2);
    }

    #[test]
    fn test_quoting_disabled_splits_on_every_delimiter() {
        let mut s = settings();
        s.parse.quoting = false;
        let table = parse_table(b"a,b,c\n\"x,y\",2\n", &s).unwrap();
        assert_eq!(table.num_columns(), 3);
        assert_eq!(table.column(0).as_string::<i32>().value(0), "\"x");
        assert_eq!(table.column(1).as_string::<i32>().value(0), "y\"");

        // With quoting off a line break can never sit inside a value.
        let err = parse_table(b"a,b\n\"x\ny\",2\n", &s).unwrap_err();
        assert!(err.message.starts_with("CSV parse error"), "{}", err.message);
    }

    #[test]
    fn test_skip_rows_and_explicit_names() {
        let data = b"# generated\n1;2\n3;4\n";
        let mut s = settings();
        s.parse.delimiter = b';';
        s.skip_rows = 1;
        s.column_names = vec!["left".into(), "right".into()];
        let table = parse_table(data, &s).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.schema().field(1).name(), "right");
    }

    #[test]
    fn test_autogenerated_names_keep_first_row() {
        let mut s = settings();
        s.autogenerate_column_names = true;
        let table = parse_table(b"1,2\n3,4\n", &s).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.schema().field(0).name(), "f0");
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let err = parse_table(b"a,b\n1,2\n3\n", &settings()).unwrap_err();
        assert!(err.message.starts_with("CSV parse error"));
    }

    #[test]
    fn test_threaded_conversion_matches_sequential() {
        let mut data = String::from("a,b,c,d\n");
        for i in 0..100 {
            data.push_str(&format!("{},{}.5,x{},true\n", i, i, i));
        }
        let sequential = parse_table(data.as_bytes(), &settings()).unwrap();
        let mut threaded = settings();
        threaded.use_threads = true;
        let threaded = parse_table(data.as_bytes(), &threaded).unwrap();
        assert_eq!(sequential, threaded);
    }
}
