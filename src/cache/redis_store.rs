use crate::cache::store::{CacheStore, KeyTtl};
use crate::error::{AppError, Result};
use crate::observability::{get_metrics, LatencyTimer};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// Redis-backed cache store.
pub struct RedisCacheStore {
    client: redis::Client,
}

impl RedisCacheStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn open(url: &str) -> Result<Self> {
        Ok(Self::new(redis::Client::open(url)?))
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Round-trips a PING to confirm the server is reachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn observe<T>(operation: &str, timer: LatencyTimer, result: &Result<T>) {
    get_metrics().record_cache_operation(operation, timer.elapsed_ms(), result.is_ok());
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "Redis operation failed");
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let timer = LatencyTimer::new();
        let result = async {
            let mut conn = self.connection().await?;
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok::<_, AppError>(value)
        }
        .await;
        observe("get", timer, &result);
        result
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let timer = LatencyTimer::new();
        let result = async {
            let mut conn = self.connection().await?;
            let _: () = conn.set_ex(key, value, ttl_seconds).await?;
            Ok::<_, AppError>(())
        }
        .await;
        observe("set_ex", timer, &result);
        result
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let timer = LatencyTimer::new();
        let result = async {
            let mut conn = self.connection().await?;
            let reply: i64 = conn.ttl(key).await?;
            Ok::<_, AppError>(KeyTtl::from_redis_reply(reply))
        }
        .await;
        observe("ttl", timer, &result);
        result
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool> {
        let timer = LatencyTimer::new();
        let result = async {
            let mut conn = self.connection().await?;
            let reply: Option<String> = conn
                .set_options(
                    key,
                    value,
                    redis::SetOptions::default()
                        .conditional_set(redis::ExistenceCheck::NX)
                        .with_expiration(redis::SetExpiry::EX(ttl_seconds as usize)),
                )
                .await?;
            Ok::<_, AppError>(reply.is_some())
        }
        .await;
        observe("set_nx", timer, &result);
        result
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let timer = LatencyTimer::new();
        let result = async {
            let mut conn = self.connection().await?;
            let deleted: i64 = conn.del(key).await?;
            Ok::<_, AppError>(deleted > 0)
        }
        .await;
        observe("del", timer, &result);
        result
    }
}
