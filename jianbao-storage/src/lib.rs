//! jianbao Storage - Collaborator Traits and Implementations
//!
//! Defines the cache and appraisal store abstractions used by the API
//! crate. The Postgres-backed appraisal store lives in jianbao-api.

pub mod appraisal_store;
pub mod cache;

pub use appraisal_store::{AppraisalStore, InMemoryAppraisalStore, StoreResult};
pub use cache::{
    CacheResult, CacheStore, InMemoryCacheStore, RedisCacheStore, RedisPolicy,
};
