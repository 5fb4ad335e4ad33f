//! This file is the root of the `carrow` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring the top-level modules: the `native` engine layer (the C ABI over
//!     arrow) and the host wrappers built on top of it.
//! 2.  Re-exporting the public surface so callers can `use carrow::{Table, ...}`.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod array;
pub mod builder;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod handle;
pub mod native;
pub mod observability;
pub mod plasma;
pub mod store;
pub mod stream;
pub mod table;
pub mod types;

mod result;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use array::Array;
pub use builder::{
    ArrayBuilder, BoolArrayBuilder, BuilderValue, Float64ArrayBuilder, Int64ArrayBuilder,
    StringArrayBuilder, TimestampArrayBuilder, BUILDER_CAPACITY,
};
pub use config::{CsvOptions, ParseOptions, ReadOptions};
pub use descriptors::{Field, Metadata, Schema};
pub use error::{CarrowError, Result};
pub use observability::init_logging;
pub use plasma::{Client, ObjectId};
pub use store::{StoreHandle, StoreServer};
pub use stream::{read_csv, read_csv_file};
pub use table::{Column, Table};
pub use types::DType;
