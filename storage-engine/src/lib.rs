pub mod memory_store;
pub mod sled_store;

pub use memory_store::MemoryBlobStore;
pub use sled_store::SledBlobStore;
