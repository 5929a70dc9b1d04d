//! SQLite storage layer.
//!
//! Draft blobs backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod blob;
pub mod pool;
