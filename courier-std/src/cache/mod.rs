//! Cache providers.

mod memory;

pub use memory::MemoryCache;
