// In: src/stream/mod.rs

//! The stream bridge: lets the native engine pull bytes from a host reader.
//!
//! The host registers its reader under an integer handle, passes the handle
//! to a native entry point together with a table of callbacks, and the engine
//! calls `read`/`tell`/`closed` with that handle as often as it needs. The
//! registry itself stays private to this module.

mod callbacks;
mod csv;
mod registry;
#[cfg(test)]
mod tests;

pub use self::csv::{read_csv, read_csv_file};
