// In: src/store/mod.rs

//! A stand-in for the external shared-memory object store: a socket server
//! that holds sealed objects in memory, and the wire protocol it speaks.

pub mod protocol;
pub mod server;

pub use server::{StoreHandle, StoreServer};
