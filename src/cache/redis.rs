//! Redis Cache Module
//!
//! [`Cache`] implementation over a pooled Redis connection. Redis owns all
//! data and native key expiry; this type only encodes items, issues
//! commands and double-checks item expiry on reads.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::redis::{cmd, pipe, Cmd, FromRedisValue, Pipeline, RedisError, RedisResult};
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime, Timeouts};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::info::parse_info;
use crate::cache::store::ttl_millis;
use crate::cache::{Cache, CacheItem, OpContext};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_lazy_delete;

// == Redis Cache ==
/// Redis-backed cache façade. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    max_retries: u32,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl RedisCache {
    // == Constructor ==
    /// Builds the connection pool, verifies connectivity and opens the
    /// configured number of idle connections.
    ///
    /// Only the first address is used; the deployment is single-node.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let address = config
            .addresses
            .first()
            .cloned()
            .unwrap_or_else(|| "localhost:6379".to_string());
        if config.addresses.len() > 1 {
            warn!(
                using = %address,
                ignored = ?&config.addresses[1..],
                "multiple cache addresses configured, only the first is used"
            );
        }

        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(config.pool_timeout);
        timeouts.create = Some(config.dial_timeout);
        timeouts.recycle = Some(config.read_timeout);

        let mut pool_config = PoolConfig::new(config.pool_size.max(1));
        pool_config.timeouts = timeouts;

        let url = connection_url(&address, &config.password, config.database);
        let mut redis_config = deadpool_redis::Config::from_url(url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| CacheError::Backend(format!("failed to create pool: {}", err)))?;

        let cache = Self {
            pool,
            max_retries: config.max_retries,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };

        cache
            .ping(&OpContext::with_timeout(config.dial_timeout))
            .await
            .map_err(|err| CacheError::Backend(format!("failed to connect to Redis: {}", err)))?;

        cache
            .warm_up(config.min_idle_conns.min(config.pool_size))
            .await?;

        info!(address = %address, database = config.database, "connected to Redis");
        Ok(cache)
    }

    /// Opens `count` connections and returns them to the pool as idle.
    async fn warm_up(&self, count: usize) -> Result<()> {
        let mut idle = Vec::with_capacity(count);
        for _ in 0..count {
            idle.push(self.pool.get().await?);
        }
        debug!(count = idle.len(), "idle connections established");
        Ok(())
    }

    // == Command Execution ==
    /// Runs `f` on a pooled connection, bounded by `timeout` and retrying
    /// transient I/O failures up to `max_retries` times.
    async fn with_conn<T, F, Fut>(&self, timeout: Duration, mut f: F) -> Result<T>
    where
        F: FnMut(Connection) -> Fut + Send,
        Fut: Future<Output = RedisResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            let conn = self.pool.get().await?;
            match tokio::time::timeout(timeout, f(conn)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if is_transient(&err) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "transient backend failure, retrying");
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    return Err(CacheError::Backend(format!(
                        "backend did not answer within {:?}",
                        timeout
                    )))
                }
            }
        }
    }

    async fn query<T>(&self, command: &Cmd, timeout: Duration) -> Result<T>
    where
        T: FromRedisValue + Send,
    {
        self.with_conn(timeout, move |mut conn| async move {
            command.query_async(&mut conn).await
        })
        .await
    }

    /// Dispatches a detached `DEL` for keys found expired on read.
    fn lazy_delete(&self, keys: Vec<String>) {
        let pool = self.pool.clone();
        let timeout = self.write_timeout;
        let mut del = cmd("DEL");
        del.arg(&keys);

        spawn_lazy_delete(keys, async move {
            let mut conn = pool.get().await?;
            let outcome: RedisResult<()> = tokio::time::timeout(timeout, del.query_async(&mut conn))
                .await
                .map_err(|_| CacheError::Backend("lazy delete timed out".to_string()))?;
            outcome.map_err(CacheError::from)
        });
    }
}

/// `SET key data PX ttl`, or `DEL key` for a zero TTL.
fn write_cmd(key: &str, data: Vec<u8>, ttl: Duration) -> Cmd {
    if ttl.is_zero() {
        let mut del = cmd("DEL");
        del.arg(key);
        return del;
    }
    let mut set = cmd("SET");
    set.arg(key).arg(data).arg("PX").arg(ttl_millis(ttl));
    set
}

/// Builds a `redis://` URL unless `address` already carries a scheme.
fn connection_url(address: &str, password: &str, database: i64) -> String {
    if address.contains("://") {
        return address.to_string();
    }
    if password.is_empty() {
        format!("redis://{}/{}", address, database)
    } else {
        format!("redis://:{}@{}/{}", password, address, database)
    }
}

/// Optimistic transaction rounds tried before `expire` gives up.
const EXPIRE_ATTEMPTS: u32 = 5;

/// Result of one optimistic `expire` round.
#[derive(Debug)]
enum ExpireOutcome {
    Updated,
    Missing,
    /// Another client wrote the key between `WATCH` and `EXEC`
    Conflict,
    Undecodable(String),
}

/// Reads, rewrites and commits `key` under `WATCH`, so a concurrent write
/// aborts the `EXEC` instead of being overwritten.
async fn expire_once(mut conn: Connection, key: &str, ttl: Duration) -> RedisResult<ExpireOutcome> {
    let _: () = cmd("WATCH").arg(key).query_async(&mut conn).await?;

    let data: Option<Vec<u8>> = cmd("GET").arg(key).query_async(&mut conn).await?;
    let Some(data) = data else {
        let _: () = cmd("UNWATCH").query_async(&mut conn).await?;
        return Ok(ExpireOutcome::Missing);
    };

    let now = Utc::now();
    let encoded = CacheItem::from_bytes(&data).and_then(|mut item| {
        item.expire_in(ttl, now);
        Ok((item.to_bytes()?, item.remaining_ttl_at(now)))
    });
    let (data, remaining) = match encoded {
        Ok(encoded) => encoded,
        Err(err) => {
            let _: () = cmd("UNWATCH").query_async(&mut conn).await?;
            return Ok(ExpireOutcome::Undecodable(err.to_string()));
        }
    };

    // EXEC answers nil when the watched key was touched
    let committed: Option<()> = expire_tx(key, data, remaining).query_async(&mut conn).await?;
    Ok(match committed {
        Some(()) => ExpireOutcome::Updated,
        None => ExpireOutcome::Conflict,
    })
}

/// `MULTI` / the rewrite from [`write_cmd`] / `EXEC`.
fn expire_tx(key: &str, data: Vec<u8>, remaining: Duration) -> Pipeline {
    let mut tx = pipe();
    tx.atomic().add_command(write_cmd(key, data, remaining)).ignore();
    tx
}

fn is_transient(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
}

#[async_trait]
impl Cache for RedisCache {
    async fn set(&self, ctx: &OpContext, key: &str, value: Value, ttl: Duration) -> Result<()> {
        ctx.run(async {
            let item = CacheItem::new(key, value, ttl);
            let data = item.to_bytes().map_err(|err| {
                error!(key, error = %err, "failed to marshal cache item");
                CacheError::from(err)
            })?;

            self.query::<()>(&write_cmd(key, data, item.ttl), self.write_timeout)
                .await
                .map_err(|err| {
                    error!(key, error = %err, "failed to set cache item");
                    err
                })?;

            debug!(key, ?ttl, "cache item set successfully");
            Ok(())
        })
        .await
    }

    async fn get(&self, ctx: &OpContext, key: &str) -> Result<Option<CacheItem>> {
        ctx.run(async {
            let data: Option<Vec<u8>> = self
                .query(cmd("GET").arg(key), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(key, error = %err, "failed to get cache item");
                    err
                })?;

            let Some(data) = data else {
                return Ok(None);
            };

            let item = CacheItem::from_bytes(&data).map_err(|err| {
                error!(key, error = %err, "failed to unmarshal cache item");
                CacheError::from(err)
            })?;

            // Redis expiry can lag the item's own expires_at
            if item.is_expired() {
                debug!(key, "cache item expired, removing");
                self.lazy_delete(vec![key.to_string()]);
                return Ok(None);
            }

            debug!(key, "cache item retrieved successfully");
            Ok(Some(item))
        })
        .await
    }

    async fn delete(&self, ctx: &OpContext, key: &str) -> Result<()> {
        ctx.run(async {
            self.query::<()>(cmd("DEL").arg(key), self.write_timeout)
                .await
                .map_err(|err| {
                    error!(key, error = %err, "failed to delete cache item");
                    err
                })?;

            debug!(key, "cache item deleted successfully");
            Ok(())
        })
        .await
    }

    async fn exists(&self, ctx: &OpContext, key: &str) -> Result<bool> {
        ctx.run(async {
            let count: u64 = self
                .query(cmd("EXISTS").arg(key), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(key, error = %err, "failed to check cache item existence");
                    err
                })?;
            Ok(count > 0)
        })
        .await
    }

    async fn set_multiple(&self, ctx: &OpContext, items: HashMap<String, CacheItem>) -> Result<()> {
        ctx.run(async {
            let mut batch = pipe();
            let mut queued = 0usize;

            for (key, item) in &items {
                let data = match item.to_bytes() {
                    Ok(data) => data,
                    Err(err) => {
                        error!(key = %key, error = %err, "failed to marshal cache item");
                        continue;
                    }
                };
                batch.add_command(write_cmd(key, data, item.ttl)).ignore();
                queued += 1;
            }

            if queued == 0 {
                return Ok(());
            }

            let batch = &batch;
            self.with_conn(self.write_timeout, move |mut conn| async move {
                let reply: RedisResult<()> = batch.query_async(&mut conn).await;
                reply
            })
            .await
            .map_err(|err| {
                error!(error = %err, "failed to set multiple cache items");
                err
            })?;

            debug!(count = queued, "multiple cache items set successfully");
            Ok(())
        })
        .await
    }

    async fn get_multiple(
        &self,
        ctx: &OpContext,
        keys: &[String],
    ) -> Result<HashMap<String, CacheItem>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        ctx.run(async {
            let results: Vec<Option<Vec<u8>>> = self
                .query(cmd("MGET").arg(keys), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(error = %err, "failed to get multiple cache items");
                    err
                })?;

            let mut items = HashMap::with_capacity(results.len());
            let mut expired = Vec::new();

            for (key, result) in keys.iter().zip(results) {
                let Some(data) = result else {
                    continue;
                };

                match CacheItem::from_bytes(&data) {
                    Ok(item) if item.is_expired() => expired.push(key.clone()),
                    Ok(item) => {
                        items.insert(key.clone(), item);
                    }
                    Err(err) => {
                        error!(key = %key, error = %err, "failed to unmarshal cache item");
                    }
                }
            }

            if !expired.is_empty() {
                self.lazy_delete(expired);
            }

            debug!(
                requested = keys.len(),
                found = items.len(),
                "multiple cache items retrieved"
            );
            Ok(items)
        })
        .await
    }

    async fn delete_multiple(&self, ctx: &OpContext, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        ctx.run(async {
            self.query::<()>(cmd("DEL").arg(keys), self.write_timeout)
                .await
                .map_err(|err| {
                    error!(error = %err, "failed to delete multiple cache items");
                    err
                })?;

            debug!(count = keys.len(), "multiple cache items deleted successfully");
            Ok(())
        })
        .await
    }

    async fn clear(&self, ctx: &OpContext) -> Result<()> {
        ctx.run(async {
            self.query::<()>(&cmd("FLUSHDB"), self.write_timeout)
                .await
                .map_err(|err| {
                    error!(error = %err, "failed to clear cache");
                    err
                })?;

            info!("cache cleared successfully");
            Ok(())
        })
        .await
    }

    async fn expire(&self, ctx: &OpContext, key: &str, ttl: Duration) -> Result<()> {
        ctx.run(async {
            for attempt in 1..=EXPIRE_ATTEMPTS {
                let outcome = self
                    .with_conn(self.write_timeout, move |conn| expire_once(conn, key, ttl))
                    .await
                    .map_err(|err| {
                        error!(key, error = %err, "failed to set expiration");
                        err
                    })?;

                match outcome {
                    ExpireOutcome::Updated => {
                        debug!(key, ?ttl, "expiration set successfully");
                        return Ok(());
                    }
                    ExpireOutcome::Missing => return Err(CacheError::NotFound(key.to_string())),
                    ExpireOutcome::Undecodable(reason) => {
                        error!(key, error = %reason, "failed to unmarshal cache item");
                        return Err(CacheError::Serialization(reason));
                    }
                    ExpireOutcome::Conflict => {
                        debug!(key, attempt, "key changed during expire, retrying");
                    }
                }
            }

            warn!(key, attempts = EXPIRE_ATTEMPTS, "expire gave up on a contended key");
            Err(CacheError::Backend(format!(
                "key {} kept changing during expire",
                key
            )))
        })
        .await
    }

    async fn ttl(&self, ctx: &OpContext, key: &str) -> Result<Option<Duration>> {
        ctx.run(async {
            let millis: i64 = self
                .query(cmd("PTTL").arg(key), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(key, error = %err, "failed to get TTL");
                    err
                })?;

            // -2: no such key, -1: key without expiry
            match millis {
                -2 => Err(CacheError::NotFound(key.to_string())),
                m if m < 0 => Ok(None),
                m => Ok(Some(Duration::from_millis(m as u64))),
            }
        })
        .await
    }

    async fn keys(&self, ctx: &OpContext, pattern: &str) -> Result<Vec<String>> {
        ctx.run(async {
            self.query(cmd("KEYS").arg(pattern), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(pattern, error = %err, "failed to get keys");
                    err
                })
        })
        .await
    }

    async fn flush_expired(&self, _ctx: &OpContext) -> Result<usize> {
        debug!("flush expired called, Redis expires keys natively");
        Ok(0)
    }

    async fn size(&self, ctx: &OpContext) -> Result<u64> {
        ctx.run(async {
            self.query(&cmd("DBSIZE"), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(error = %err, "failed to get cache size");
                    err
                })
        })
        .await
    }

    async fn info(&self, ctx: &OpContext) -> Result<HashMap<String, String>> {
        ctx.run(async {
            let text: String = self
                .query(&cmd("INFO"), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(error = %err, "failed to get cache info");
                    err
                })?;
            Ok(parse_info(&text))
        })
        .await
    }

    async fn ping(&self, ctx: &OpContext) -> Result<()> {
        ctx.run(async {
            self.query::<String>(&cmd("PING"), self.read_timeout)
                .await
                .map_err(|err| {
                    error!(error = %err, "ping failed");
                    err
                })?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        info!("Redis connection pool closed");
        Ok(())
    }
}
