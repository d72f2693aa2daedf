use crate::cache::store::{CacheStore, KeyTtl};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &[u8], now: Instant, ttl_seconds: u64) -> Result<Self> {
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_seconds))
            .ok_or_else(|| AppError::Validation(format!("TTL of {}s is out of range", ttl_seconds)))?;
        Ok(Self {
            value: value.to_vec(),
            expires_at,
        })
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local cache store with lazy expiry.
///
/// Time is read from `tokio::time`, so a paused test runtime controls expiry.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|v| !v.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let stored = StoredValue::new(value, Instant::now(), ttl_seconds)?;
        self.entries.lock().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(stored) if !stored.is_expired(now) => {
                // Round up so a key written this instant reports its full TTL.
                let remaining = stored.expires_at - now;
                let secs = (remaining.as_millis() as u64 + 999) / 1000;
                Ok(KeyTtl::Expires(secs))
            }
            _ => Ok(KeyTtl::Missing),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), StoredValue::new(value, now, ttl_seconds)?);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.entries.lock().await.remove(key);
        Ok(matches!(removed, Some(stored) if !stored.is_expired(now)))
    }
}

/// Background task that periodically purges expired keys from an in-memory store.
pub struct ExpirySweeper {
    store: Arc<InMemoryCacheStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<InMemoryCacheStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub async fn run_once(&self) -> usize {
        self.store.purge_expired().await
    }

    /// Starts the sweeper in a background task.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;

                let purged = self.store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_value_until_expiry() {
        let store = InMemoryCacheStore::new();
        store.set_with_expiry("k", b"v", 10).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_reports_remaining_seconds() {
        let store = InMemoryCacheStore::new();
        store.set_with_expiry("k", b"v", 3600).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Expires(3600));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Expires(3599));

        assert_eq!(store.ttl("missing").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_restarts_countdown() {
        let store = InMemoryCacheStore::new();
        store.set_with_expiry("k", b"a", 10).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        store.set_with_expiry("k", b"b", 10).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Expires(10));
        assert_eq!(store.get("k").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent() {
        let store = InMemoryCacheStore::new();
        assert!(store.set_if_absent("lock", b"1", 5).await.unwrap());
        assert!(!store.set_if_absent("lock", b"2", 5).await.unwrap());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.set_if_absent("lock", b"3", 5).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn test_overflowing_ttl_is_rejected() {
        let store = InMemoryCacheStore::new();
        let err = store.set_with_expiry("k", b"v", u64::MAX).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.set_if_absent("lock", b"v", u64::MAX).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryCacheStore::new();
        store.set_with_expiry("k", b"v", 60).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.set_with_expiry("short", b"v", 1).await.unwrap();
        store.set_with_expiry("long", b"v", 100).await.unwrap();

        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(1));
        assert_eq!(sweeper.run_once().await, 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(sweeper.run_once().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_sweeper_purges_in_background() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.set_with_expiry("short", b"v", 1).await.unwrap();
        store.set_with_expiry("long", b"v", 100).await.unwrap();

        let handle = ExpirySweeper::new(store.clone(), Duration::from_secs(1)).start();
        tokio::time::sleep(Duration::from_secs(3)).await;

        // Raw map size, since `len` already hides expired keys.
        assert_eq!(store.entries.lock().await.len(), 1);
        assert!(store.entries.lock().await.contains_key("long"));
        handle.abort();
    }
}
