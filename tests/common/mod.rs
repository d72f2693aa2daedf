#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use webhook_idempotency::cache::{CacheStore, InMemoryCacheStore, KeyTtl};
use webhook_idempotency::error::{AppError, Result};
use webhook_idempotency::gateway::{GatewayError, PaymentGateway, PaymentRequest, Transaction};

pub fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
}

pub fn unique_event_id(prefix: &str) -> String {
    format!(
        "{}_{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

/// In-memory store whose reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryCacheStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn failing_reads() -> Self {
        let store = Self::default();
        store.fail_reads.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_writes() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check(&self.fail_reads)?;
        self.inner.get(key).await
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.inner.set_with_expiry(key, value, ttl_seconds).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.check(&self.fail_reads)?;
        self.inner.ttl(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool> {
        self.check(&self.fail_writes)?;
        self.inner.set_if_absent(key, value, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check(&self.fail_writes)?;
        self.inner.delete(key).await
    }
}

/// Gateway that counts calls and takes `delay` to answer.
pub struct SlowGateway {
    pub calls: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl SlowGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

#[async_trait]
impl PaymentGateway for SlowGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> std::result::Result<Transaction, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        Ok(Transaction::succeeded(format!("txn_slow_{}", call), request.amount))
    }
}
