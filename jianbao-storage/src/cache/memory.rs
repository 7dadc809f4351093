//! In-memory cache store.
//!
//! Mirrors the subset of Redis semantics the bookkeeper relies on,
//! including lazy expiry. Time comes from `tokio::time::Instant` so tests
//! can drive expiry with a paused clock.

use async_trait::async_trait;
use jianbao_core::CacheError;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::traits::{CacheResult, CacheStore};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Thread-safe in-memory cache store.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock the map and drop the entry at `key` if it has expired.
    fn locked(&self, key: &str) -> CacheResult<MutexGuard<'_, HashMap<String, Entry>>> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Backend {
            reason: "in-memory cache lock poisoned".to_string(),
        })?;
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(entries)
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::Backend {
        reason: format!("WRONGTYPE operation against key {key}"),
    }
}

fn parse_int(key: &str, raw: &str) -> CacheResult<i64> {
    raw.trim().parse().map_err(|_| CacheError::MalformedValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn ping(&self) -> CacheResult<()> {
        self.locked("").map(|_| ())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.locked(key)?;
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::Set(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut entries = self.locked(key)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> CacheResult<i64> {
        let mut entries = self.locked(key)?;
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Str("0".to_string()),
            expires_at: None,
        });
        let Value::Str(raw) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let next = parse_int(key, raw)? + by;
        *raw = next.to_string();
        Ok(next)
    }

    async fn decr_floor(&self, key: &str, by: i64) -> CacheResult<i64> {
        let mut entries = self.locked(key)?;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(0);
        };
        let Value::Str(raw) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let current = parse_int(key, raw)?;
        if current <= 0 {
            return Ok(0);
        }
        let next = (current - by).max(0);
        *raw = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut entries = self.locked(key)?;
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let entries = self.locked(key)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut entries = self.locked(key)?;
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(members) => Ok(members.insert(member.to_string())),
            Value::Str(_) => Err(wrong_type(key)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut entries = self.locked(key)?;
        let removed = match entries.get_mut(key).map(|e| &mut e.value) {
            None => return Ok(false),
            Some(Value::Set(members)) => members.remove(member),
            Some(Value::Str(_)) => return Err(wrong_type(key)),
        };
        // Redis deletes a set once it is empty.
        if matches!(entries.get(key).map(|e| &e.value), Some(Value::Set(m)) if m.is_empty()) {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> CacheResult<BTreeSet<String>> {
        let entries = self.locked(key)?;
        match entries.get(key).map(|e| &e.value) {
            None => Ok(BTreeSet::new()),
            Some(Value::Set(members)) => Ok(members.clone()),
            Some(Value::Str(_)) => Err(wrong_type(key)),
        }
    }

    async fn scard(&self, key: &str) -> CacheResult<u64> {
        Ok(self.smembers(key).await?.len() as u64)
    }

    async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool> {
        Ok(self.smembers(key).await?.contains(member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_decr_floor_never_goes_negative() {
        let store = InMemoryCacheStore::new();
        assert_eq!(store.decr_floor("k", 1).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), None);

        store.incr("k", 2).await.unwrap();
        assert_eq!(store.decr_floor("k", 5).await.unwrap(), 0);
        assert_eq!(store.decr_floor("k", 1).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_malformed_counter_is_reported() {
        let store = InMemoryCacheStore::new();
        store.set("k", "abc", None).await.unwrap();
        let err = store.incr("k", 1).await.unwrap_err();
        assert!(matches!(err, CacheError::MalformedValue { .. }));
    }

    #[tokio::test]
    async fn test_set_membership_is_idempotent() {
        let store = InMemoryCacheStore::new();
        assert!(store.sadd("s", "a1").await.unwrap());
        assert!(!store.sadd("s", "a1").await.unwrap());
        assert_eq!(store.scard("s").await.unwrap(), 1);
        assert!(store.srem("s", "a1").await.unwrap());
        assert!(!store.srem("s", "a1").await.unwrap());
        assert!(!store.sismember("s", "a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = InMemoryCacheStore::new();
        store.sadd("s", "a1").await.unwrap();
        assert!(store.incr("s", 1).await.is_err());
        assert!(store.get("s").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire() {
        let store = InMemoryCacheStore::new();
        store.incr("k", 1).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), None);
        assert!(store.expire("k", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.ttl("k").await.unwrap(), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.ttl("k").await.unwrap(), Some(Duration::from_secs(6)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.expire("k", Duration::from_secs(10)).await.unwrap());
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn prop_counter_never_negative(
            deltas in proptest::collection::vec(prop_oneof![Just(1i64), Just(-1i64)], 0..64)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(|e| TestCaseError::fail(format!("runtime: {e}")))?;
            let store = InMemoryCacheStore::new();
            rt.block_on(async {
                let mut expected: i64 = 0;
                for delta in deltas {
                    let value = if delta > 0 {
                        store.incr("k", delta).await.unwrap()
                    } else {
                        store.decr_floor("k", -delta).await.unwrap()
                    };
                    expected = (expected + delta).max(0);
                    prop_assert!(value >= 0);
                    prop_assert_eq!(value, expected);
                }
                Ok(())
            })?;
        }
    }
}
