//! This module defines the core, strongly-typed data representations shared by
//! the host wrappers and the native engine.
//!
//! It currently holds the closed `DType` enumeration, which is the only type
//! tag that crosses the native boundary (as a stable integer code).

pub mod dtype;

// Re-export the main type(s) for easier access.
pub use dtype::DType;
