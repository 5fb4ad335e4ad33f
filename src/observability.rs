// In: src/observability.rs

//! Process-wide logging setup. The library itself only emits through the `log`
//! macros; hosts that want to see them call `init_logging` once.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Once;

use colored::Colorize;
use log::{Level, LevelFilter};

use crate::error::Result;

static INIT_LOGGER: Once = Once::new();

fn colored_level(level: Level) -> colored::ColoredString {
    let tag = level.as_str();
    match level {
        Level::Error => tag.red().bold(),
        Level::Warn => tag.yellow(),
        Level::Info => tag.green(),
        Level::Debug => tag.blue(),
        Level::Trace => tag.dimmed(),
    }
}

/// Configures `env_logger` at `level`, writing to stderr or, when `log_file`
/// is given, appending to that file (uncolored). Only the first call has any
/// effect; later calls return `Ok(())` without touching the logger or the file.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut opened = Ok(());

    INIT_LOGGER.call_once(|| {
        let target = match log_file.map(|path| OpenOptions::new().append(true).create(true).open(path)) {
            Some(Ok(file)) => Some(file),
            Some(Err(e)) => {
                opened = Err(e);
                return;
            }
            None => None,
        };

        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        let to_file = target.is_some();
        builder.format(move |buf, record| {
            if to_file {
                writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
            } else {
                writeln!(buf, "[{}] {}: {}", colored_level(record.level()), record.target(), record.args())
            }
        });

        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(opened?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carrow.log");
        init_logging(LevelFilter::Debug, Some(&path)).unwrap();
        init_logging(LevelFilter::Trace, None).unwrap();
        assert!(path.exists());

        // Later calls leave the filesystem alone.
        let ignored = dir.path().join("ignored.log");
        init_logging(LevelFilter::Info, Some(&ignored)).unwrap();
        assert!(!ignored.exists());
    }
}
