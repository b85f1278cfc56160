//! Backends that need no SDK: in-memory and local filesystem
//!
//! Network backends live in their own crates (`ds-s3`, `ds-http`).

pub mod local;
pub mod memory;

pub use local::LocalConnector;
pub use memory::{MemoryConnector, MemoryStore};
