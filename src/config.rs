// In: src/config.rs

//! The single source of truth for delimited-text reading options.
//!
//! `CsvOptions` is built once at the call site (in code, or from a JSON
//! document via `CsvOptions::from_json`) and passed by reference to
//! `stream::read_csv`. Every field has a serde default matching the engine's
//! own defaults, so a partial document is always a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{CarrowError, Result};

//==================================================================================
// I. Parse Options
//==================================================================================

/// How a single line of text is split into values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ParseOptions {
    /// The field separator. Must be a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Whether `quote_char` starts a quoted value.
    #[serde(default = "default_true")]
    pub quoting: bool,

    #[serde(default = "default_quote_char")]
    pub quote_char: char,

    /// Whether two consecutive quote characters inside a quoted value stand for one.
    #[serde(default = "default_true")]
    pub double_quote: bool,

    /// Whether `escape_char` escapes the next character.
    #[serde(default)]
    pub escaping: bool,

    #[serde(default = "default_escape_char")]
    pub escape_char: char,

    /// Whether quoted values may contain line breaks. When false, a line
    /// break inside quotes is a parse error.
    #[serde(default)]
    pub newlines_in_values: bool,

    /// Whether blank lines are skipped. When false, a blank line is a parse error.
    #[serde(default = "default_true")]
    pub ignore_empty_lines: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            quoting: true,
            quote_char: default_quote_char(),
            double_quote: true,
            escaping: false,
            escape_char: default_escape_char(),
            newlines_in_values: false,
            ignore_empty_lines: true,
        }
    }
}

//==================================================================================
// II. Read Options
//==================================================================================

/// How the byte stream is consumed and how columns are named.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReadOptions {
    /// Pump the stream and convert columns on worker threads.
    #[serde(default = "default_true")]
    pub use_threads: bool,

    /// Bytes requested from the stream per read callback.
    #[serde(default = "default_block_size")]
    pub block_size: u32,

    /// Lines skipped before the header (or first data row).
    #[serde(default)]
    pub skip_rows: u32,

    /// Name columns `f0`, `f1`, ... instead of reading a header row.
    #[serde(default)]
    pub autogenerate_column_names: bool,

    /// Explicit column names. When non-empty, no header row is read and
    /// `autogenerate_column_names` is ignored.
    #[serde(default)]
    pub column_names: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            use_threads: true,
            block_size: default_block_size(),
            skip_rows: 0,
            autogenerate_column_names: false,
            column_names: Vec::new(),
        }
    }
}

//==================================================================================
// III. Combined Options
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CsvOptions {
    #[serde(default)]
    pub read: ReadOptions,
    #[serde(default)]
    pub parse: ParseOptions,
}

impl CsvOptions {
    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks the constraints serde can't express.
    pub fn validate(&self) -> Result<()> {
        for (name, c) in [
            ("delimiter", self.parse.delimiter),
            ("quote_char", self.parse.quote_char),
            ("escape_char", self.parse.escape_char),
        ] {
            ascii_byte(name, c)?;
        }
        if self.parse.delimiter == '\n' || self.parse.delimiter == '\r' {
            return Err(CarrowError::InvalidOption("delimiter can't be a line break".into()));
        }
        if self.read.block_size == 0 {
            return Err(CarrowError::InvalidOption("block_size must be positive".into()));
        }
        Ok(())
    }
}

/// Converts a single-byte option character.
pub(crate) fn ascii_byte(name: &str, c: char) -> Result<u8> {
    if !c.is_ascii() {
        return Err(CarrowError::InvalidOption(format!(
            "{} must be an ASCII character, got {:?}",
            name, c
        )));
    }
    Ok(c as u8)
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_quote_char() -> char {
    '"'
}

fn default_escape_char() -> char {
    '\\'
}

/// 1 MiB.
fn default_block_size() -> u32 {
    1 << 20
}
