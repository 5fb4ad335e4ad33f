// In: src/stream/tests.rs

use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::*;
use crate::config::CsvOptions;
use crate::error::CarrowError;
use crate::types::DType;

/// Wraps a reader, fails after `fail_after` bytes if set, and records when the
/// bridge drops it.
struct TrackedReader {
    inner: Cursor<Vec<u8>>,
    fail_after: Option<u64>,
    dropped: Arc<AtomicBool>,
}

impl TrackedReader {
    fn new(data: &str, fail_after: Option<u64>) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let reader = Self {
            inner: Cursor::new(data.as_bytes().to_vec()),
            fail_after,
            dropped: Arc::clone(&dropped),
        };
        (reader, dropped)
    }
}

impl Read for TrackedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(limit) = self.fail_after {
            if self.inner.position() >= limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
            }
        }
        self.inner.read(buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

fn options(use_threads: bool, block_size: u32) -> CsvOptions {
    let mut options = CsvOptions::default();
    options.read.use_threads = use_threads;
    options.read.block_size = block_size;
    options
}

const SENSORS: &str = "\
sensor,reading,ok,taken_at,note
a,1.25,true,2024-05-01T10:00:00Z,first
b,2.5,false,2024-05-01T10:00:01.5Z,
c,,true,2024-05-01T10:00:02Z,\"quoted, with comma\"
";

#[test]
fn test_read_csv_infers_a_typed_table() {
    // Tiny blocks force many read callbacks.
    for (threads, block) in [(false, 7), (true, 7), (true, 1 << 20)] {
        let (reader, dropped) = TrackedReader::new(SENSORS, None);
        let table = read_csv(reader, &options(threads, block)).unwrap();
        assert!(dropped.load(Ordering::SeqCst), "stream still registered");

        assert_eq!(table.num_rows(), 3);
        assert_eq!(
            table.column_names().unwrap(),
            vec!["sensor", "reading", "ok", "taken_at", "note"]
        );
        let dtypes: Vec<DType> = (0..5).map(|i| table.field(i).unwrap().dtype()).collect();
        assert_eq!(
            dtypes,
            vec![DType::String, DType::Float64, DType::Bool, DType::Timestamp, DType::String]
        );

        let readings = table.column_by_name("reading").unwrap();
        assert_eq!(readings.float64_at(1).unwrap(), 2.5);
        assert!(readings.is_null(2).unwrap());
        assert_eq!(readings.null_count().unwrap(), 1);

        let taken = table.column(3).unwrap().time_at(1).unwrap();
        assert_eq!(taken.timestamp_subsec_millis(), 500);
        assert_eq!(table.column(4).unwrap().string_at(2).unwrap(), "quoted, with comma");
    }
}

#[test]
fn test_reader_failure_aborts_the_parse() {
    let (reader, dropped) = TrackedReader::new(SENSORS, Some(10));
    let err = read_csv(reader, &options(true, 4)).unwrap_err();
    assert!(matches!(err, CarrowError::Marshal(_)));
    assert!(err.to_string().contains("disk went away"), "{}", err);
    assert!(dropped.load(Ordering::SeqCst), "stream leaked after failure");
}

#[test]
fn test_explicit_column_names_and_skip_rows() {
    let text = "exported by logger v2\n1|x\n2|y\n";
    let mut options = CsvOptions::default();
    options.parse.delimiter = '|';
    options.read.skip_rows = 1;
    options.read.column_names = vec!["id".into(), "tag".into()];

    let table = read_csv(Cursor::new(text.as_bytes().to_vec()), &options).unwrap();
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.column_by_name("id").unwrap().int64_at(1).unwrap(), 2);
    assert_eq!(table.column_by_name("tag").unwrap().string_at(0).unwrap(), "x");
}

#[test]
fn test_blank_line_rejected_when_not_ignored() {
    let mut options = CsvOptions::default();
    options.parse.ignore_empty_lines = false;
    let err = read_csv(Cursor::new(b"a\n1\n\n2\n".to_vec()), &options).unwrap_err();
    assert!(err.to_string().contains("empty line"), "{}", err);
}

#[test]
fn test_invalid_options_never_register_the_reader() {
    let (reader, dropped) = TrackedReader::new(SENSORS, None);
    let mut options = CsvOptions::default();
    options.parse.delimiter = 'é';
    let err = read_csv(reader, &options).unwrap_err();
    assert!(matches!(err, CarrowError::InvalidOption(_)));
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn test_read_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("readings.csv");
    std::fs::write(&path, SENSORS).unwrap();
    let table = read_csv_file(&path, &CsvOptions::default()).unwrap();
    assert_eq!(table.num_rows(), 3);

    let missing = read_csv_file(dir.path().join("nope.csv"), &CsvOptions::default()).unwrap_err();
    assert!(matches!(missing, CarrowError::Io(_)));
}
