pub mod layer;
pub mod memory;
pub mod store;

pub use layer::{CacheKey, CacheLayer};
pub use memory::MemoryCache;
pub use store::CacheStore;
