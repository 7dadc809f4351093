//! Redis cache store.
//!
//! Every command runs once under a timeout. There are no retries: the stats
//! kept here are advisory and the next status change re-attempts its own
//! adjustment.
//!
//! One `ConnectionManager` is opened on first use and shared by every clone
//! of the store. It multiplexes commands and reconnects on its own after the
//! server drops the link.

use async_trait::async_trait;
use jianbao_core::CacheError;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use super::traits::{CacheResult, CacheStore};

/// Decrement-with-floor as a single server-side step.
///
/// Missing keys read as 0; values at or below zero are left alone. `KEEPTTL`
/// keeps the current expiry so the caller decides when to refresh it.
const DECR_FLOOR_LUA: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return 0
end
local current = tonumber(raw)
if current == nil then
  return redis.error_reply('ERR value is not an integer')
end
if current <= 0 then
  return 0
end
local next = current - tonumber(ARGV[1])
if next < 0 then
  next = 0
end
redis.call('SET', KEYS[1], next, 'KEEPTTL')
return next
"#;

/// Connection policy for the Redis store.
#[derive(Debug, Clone)]
pub struct RedisPolicy {
    /// Upper bound on a single command, connection setup included.
    pub timeout: Duration,
}

impl Default for RedisPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
        }
    }
}

/// Redis-backed cache store.
#[derive(Clone)]
pub struct RedisCacheStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    policy: RedisPolicy,
    decr_floor: Script,
}

impl RedisCacheStore {
    /// Build a store for `url`. No connection is opened until first use.
    pub fn new(url: &str, policy: RedisPolicy) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connection {
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            conn: Arc::new(OnceCell::new()),
            policy,
            decr_floor: Script::new(DECR_FLOOR_LUA),
        })
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, op: F) -> CacheResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let attempt = async {
            let conn = self.connection().await?;
            op(conn).await.map_err(|e| map_redis_error(operation, e))
        };
        match timeout(self.policy.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.policy.timeout.as_millis() as u64,
            }),
        }
    }
}

impl RedisCacheStore {
    /// Shared connection, opened on first use. A failed open leaves the slot
    /// empty so the next command tries again.
    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let manager = self
            .conn
            .get_or_try_init(|| self.client.get_connection_manager())
            .await
            .map_err(|e| CacheError::Connection {
                reason: e.to_string(),
            })?;
        Ok(manager.clone())
    }

    /// Whether the shared connection has been opened.
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
        CacheError::Connection {
            reason: format!("{operation}: {err}"),
        }
    } else if err.is_timeout() {
        CacheError::Timeout {
            operation: operation.to_string(),
            timeout_ms: 0,
        }
    } else {
        CacheError::Backend {
            reason: format!("{operation}: {err}"),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn ping(&self) -> CacheResult<()> {
        self.run("ping", |mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let key = key.to_string();
        self.run("get", move |mut conn| async move {
            let value: Option<String> = conn.get(&key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.run("set", move |mut conn| async move {
            match ttl {
                Some(ttl) => {
                    let _: () = conn.set_ex(&key, &value, ttl.as_secs().max(1)).await?;
                }
                None => {
                    let _: () = conn.set(&key, &value).await?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn incr(&self, key: &str, by: i64) -> CacheResult<i64> {
        let key = key.to_string();
        self.run("incr", move |mut conn| async move {
            let value: i64 = conn.incr(&key, by).await?;
            Ok(value)
        })
        .await
    }

    async fn decr_floor(&self, key: &str, by: i64) -> CacheResult<i64> {
        let key = key.to_string();
        let script = self.decr_floor.clone();
        self.run("decr_floor", move |mut conn| async move {
            let value: i64 = script.key(&key).arg(by).invoke_async(&mut conn).await?;
            Ok(value)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let key = key.to_string();
        let secs = ttl.as_secs().max(1) as i64;
        self.run("expire", move |mut conn| async move {
            let applied: bool = conn.expire(&key, secs).await?;
            Ok(applied)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let key = key.to_string();
        self.run("ttl", move |mut conn| async move {
            // -2: missing key, -1: no expiry
            let secs: i64 = conn.ttl(&key).await?;
            Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
        })
        .await
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<bool> {
        let key = key.to_string();
        let member = member.to_string();
        self.run("sadd", move |mut conn| async move {
            let added: i64 = conn.sadd(&key, &member).await?;
            Ok(added > 0)
        })
        .await
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<bool> {
        let key = key.to_string();
        let member = member.to_string();
        self.run("srem", move |mut conn| async move {
            let removed: i64 = conn.srem(&key, &member).await?;
            Ok(removed > 0)
        })
        .await
    }

    async fn smembers(&self, key: &str) -> CacheResult<BTreeSet<String>> {
        let key = key.to_string();
        self.run("smembers", move |mut conn| async move {
            let members: HashSet<String> = conn.smembers(&key).await?;
            Ok(members.into_iter().collect())
        })
        .await
    }

    async fn scard(&self, key: &str) -> CacheResult<u64> {
        let key = key.to_string();
        self.run("scard", move |mut conn| async move {
            let count: u64 = conn.scard(&key).await?;
            Ok(count)
        })
        .await
    }

    async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool> {
        let key = key.to_string();
        let member = member.to_string();
        self.run("sismember", move |mut conn| async move {
            let present: bool = conn.sismember(&key, &member).await?;
            Ok(present)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_connection_error() {
        let err = RedisCacheStore::new("not a url", RedisPolicy::default())
            .err()
            .expect("invalid url must fail");
        assert!(matches!(err, CacheError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_fast() {
        let store = RedisCacheStore::new(
            "redis://127.0.0.1:6390",
            RedisPolicy {
                timeout: Duration::from_millis(200),
            },
        )
        .expect("valid url");
        let err = store.incr("k", 1).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Connection { .. } | CacheError::Timeout { .. }
        ));
        // A failed open is not cached.
        assert!(!store.is_connected());
    }

    #[test]
    fn test_clones_share_one_connection_slot() {
        let store = RedisCacheStore::new("redis://127.0.0.1:6390", RedisPolicy::default())
            .expect("valid url");
        let clone = store.clone();
        assert!(Arc::ptr_eq(&store.conn, &clone.conn));
        assert!(!clone.is_connected());
    }

    #[tokio::test]
    #[ignore = "requires JIANBAO_REDIS_URL and a local Redis"]
    async fn test_decr_floor_against_redis() {
        let Ok(url) = std::env::var("JIANBAO_REDIS_URL") else {
            return;
        };
        let store = RedisCacheStore::new(&url, RedisPolicy::default()).expect("client");
        let key = format!("jianbao-test:decr:{}", std::process::id());
        store.set(&key, "1", Some(Duration::from_secs(60))).await.unwrap();
        assert_eq!(store.decr_floor(&key, 1).await.unwrap(), 0);
        assert_eq!(store.decr_floor(&key, 1).await.unwrap(), 0);
        assert!(store.ttl(&key).await.unwrap().is_some());

        // Every command above went through the one shared connection.
        assert!(store.is_connected());
        assert!(store.clone().is_connected());
    }
}
