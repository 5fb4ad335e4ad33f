// In: src/plasma/mod.rs

//! Object store client: writes whole tables to, and reads them back from, a
//! store keyed by fixed-width object ids.

mod client;
mod object_id;

pub use client::Client;
pub use object_id::ObjectId;
