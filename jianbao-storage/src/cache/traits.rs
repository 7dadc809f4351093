//! Cache store trait.
//!
//! This module defines the operations the stats bookkeeper needs from a
//! key/value cache: string counters, string sets, and per-key expiry.

use async_trait::async_trait;
use jianbao_core::CacheError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache store trait for pluggable cache implementations.
///
/// This trait abstracts over Redis and an in-memory map. Implementations
/// must be thread-safe. Keys are plain strings; namespacing is the caller's
/// job.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check the backend is reachable.
    async fn ping(&self) -> CacheResult<()>;

    /// Get a string value.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a string value, optionally with an expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Increment an integer value (missing keys count as 0). Returns the new value.
    async fn incr(&self, key: &str, by: i64) -> CacheResult<i64>;

    /// Atomically decrement an integer value without going below zero.
    ///
    /// A missing key or a value already at or below zero is left untouched.
    /// Returns the resulting value, clamped to zero. Existing expiry is kept.
    async fn decr_floor(&self, key: &str, by: i64) -> CacheResult<i64>;

    /// Set the expiry of a key. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remaining time to live. `None` if the key is missing or never expires.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Add a member to a set. Returns true if it was newly added.
    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool>;

    /// Remove a member from a set. Removing a non-member is not an error.
    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool>;

    /// All members of a set (empty if missing).
    async fn smembers(&self, key: &str) -> CacheResult<BTreeSet<String>>;

    /// Cardinality of a set (0 if missing).
    async fn scard(&self, key: &str) -> CacheResult<u64>;

    /// Whether a set contains a member.
    async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool>;
}
