pub mod memory;
pub mod store;

pub use memory::MemoryBlobStore;
pub use store::{BlobStore, DraftStore};
