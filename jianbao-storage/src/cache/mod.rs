//! Cache layer for advisory statistics.
//!
//! - `CacheStore`: the operations the stats bookkeeper needs
//! - `InMemoryCacheStore`: process-local store with expiry, for tests and local runs
//! - `RedisCacheStore`: the shared production store

mod memory;
mod redis_backend;
mod traits;

pub use memory::InMemoryCacheStore;
pub use redis_backend::{RedisCacheStore, RedisPolicy};
pub use traits::{CacheResult, CacheStore};
