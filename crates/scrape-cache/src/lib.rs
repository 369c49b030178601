//! Best-effort key-value cache over Redis.
//!
//! Every read degrades to `None` and every write degrades to a no-op when
//! Redis is unreachable — the pipeline must keep functioning, just slower,
//! with the cache offline. No method here ever surfaces a Redis error to
//! its caller.

pub mod keys;

use std::time::Duration;

use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Wraps a lazily-established Redis connection. `connect` never fails: if
/// Redis is down at startup the client is built in a disabled state and
/// every operation quietly no-ops until a connection succeeds.
#[derive(Clone)]
pub struct CacheClient {
    client: Option<Client>,
    conn: Option<MultiplexedConnection>,
}

impl CacheClient {
    /// Attempts to open a multiplexed connection against `redis_url`.
    /// Connection failure is logged and swallowed — `self` is still
    /// returned, just without a live connection.
    pub async fn connect(redis_url: &str) -> Self {
        let client = match Client::open(redis_url) {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "invalid redis url, cache disabled");
                return Self {
                    client: None,
                    conn: None,
                };
            }
        };

        let conn = match client.get_multiplexed_tokio_connection().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(error = %err, "redis unavailable at startup, cache disabled");
                None
            }
        };

        Self {
            client: Some(client),
            conn,
        }
    }

    /// Lazily reconnects if the cached connection was never established.
    /// Returns `None` if Redis is still unreachable.
    async fn connection(&self) -> Option<MultiplexedConnection> {
        if let Some(conn) = &self.conn {
            return Some(conn.clone());
        }
        self.client.as_ref()?.get_multiplexed_tokio_connection().await.ok()
    }

    /// Returns the deserialized value for `key`, or `None` on a cache miss
    /// *or* any Redis error — the two are indistinguishable by design.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await.ok().flatten();
        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(err) => {
                    warn!(key, error = %err, "corrupt cache entry, treating as miss");
                    None
                }
            },
            None => {
                debug!(key, "cache miss");
                None
            }
        }
    }

    /// Best-effort write with a TTL. Failures are logged and dropped.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let Ok(raw) = serde_json::to_string(value) else {
            warn!(key, "failed to serialize cache value");
            return;
        };
        if let Err(err) = conn
            .set_ex::<_, _, ()>(key, raw, ttl.as_secs().max(1))
            .await
        {
            warn!(key, error = %err, "cache write failed");
        }
    }

    /// `get`; on a miss, computes via `produce`, stores the result under
    /// `ttl`, and returns it either way. The store is fire-and-forget with
    /// respect to the caller — `produce`'s result is always returned even
    /// if the subsequent write fails.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Duration, produce: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return cached;
        }
        let value = produce().await;
        self.set(key, &value, ttl).await;
        value
    }

    /// Best-effort delete of a single key.
    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(err) = conn.del::<_, ()>(key).await {
            warn!(key, error = %err, "cache delete failed");
        }
    }

    /// Deletes every key matching `pattern` via `SCAN` + `DEL`, in batches
    /// of 100. Used to invalidate `media:*` after a worker persists new
    /// media. Best-effort: a mid-scan Redis error just stops the sweep.
    pub async fn clear_pattern(&self, pattern: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };

        let mut cursor: u64 = 0;
        let mut total_deleted = 0usize;
        loop {
            let scanned: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            let (next_cursor, found) = match scanned {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(pattern, error = %err, "cache pattern scan failed");
                    return;
                }
            };

            if !found.is_empty() {
                match conn.del::<_, usize>(&found).await {
                    Ok(deleted) => total_deleted += deleted,
                    Err(err) => warn!(pattern, error = %err, "cache pattern delete failed"),
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern, total_deleted, "cache pattern invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_reads_return_none() {
        // An unreachable address never panics, it just disables the cache.
        let client = CacheClient::connect("redis://127.0.0.1:1").await;
        let got: Option<String> = client.get("anything").await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn get_or_set_calls_producer_when_disabled() {
        let client = CacheClient::connect("redis://127.0.0.1:1").await;
        let value = client
            .get_or_set("k", Duration::from_secs(1), || async { 42i32 })
            .await;
        assert_eq!(value, 42);
    }
}
