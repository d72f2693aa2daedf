use crate::cache::{CacheStore, KeyTtl};
use crate::config::{IdempotencySettings, ReadFailurePolicy};
use crate::error::{AppError, Result};
use crate::gateway::{PaymentGateway, PaymentRequest};
use crate::observability::{get_metrics, LatencyTimer};
use crate::webhook::entry::{CacheEntry, Outcome};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counters for webhook processing.
#[derive(Debug, Default)]
pub struct WebhookMetrics {
    pub total_events: AtomicU64,
    pub processed_events: AtomicU64,
    pub duplicate_events: AtomicU64,
    pub replayed_failures: AtomicU64,
    pub failed_events: AtomicU64,
    pub malformed_entries: AtomicU64,
    pub in_flight_rejections: AtomicU64,
}

impl WebhookMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicate_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replayed_failure(&self) {
        self.replayed_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_in_flight(&self) {
        self.in_flight_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_events: self.total_events.load(Ordering::Relaxed),
            processed_events: self.processed_events.load(Ordering::Relaxed),
            duplicate_events: self.duplicate_events.load(Ordering::Relaxed),
            replayed_failures: self.replayed_failures.load(Ordering::Relaxed),
            failed_events: self.failed_events.load(Ordering::Relaxed),
            malformed_entries: self.malformed_entries.load(Ordering::Relaxed),
            in_flight_rejections: self.in_flight_rejections.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    pub processed_events: u64,
    pub duplicate_events: u64,
    pub replayed_failures: u64,
    pub failed_events: u64,
    pub malformed_entries: u64,
    pub in_flight_rejections: u64,
}

impl MetricsSnapshot {
    /// Share of events answered from the cache instead of the gateway.
    pub fn duplicate_rate(&self) -> f64 {
        if self.total_events == 0 {
            0.0
        } else {
            (self.duplicate_events + self.replayed_failures) as f64 / self.total_events as f64
        }
    }
}

/// Processes webhook events so each event id reaches the gateway at most once per
/// cache window.
///
/// Successful outcomes are cached for `success_ttl_secs`, failures for
/// `failure_ttl_secs`. A cached failure is replayed to redeliveries without
/// calling the gateway, which keeps a failing gateway from being hammered by
/// sender retries.
///
/// Without `in_flight_lock`, two concurrent first deliveries of the same event
/// can both miss the cache and both reach the gateway.
pub struct WebhookProcessor {
    store: Arc<dyn CacheStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: IdempotencySettings,
    metrics: Arc<WebhookMetrics>,
}

impl WebhookProcessor {
    pub fn new(store: Arc<dyn CacheStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::with_settings(store, gateway, IdempotencySettings::default())
    }

    pub fn with_settings(
        store: Arc<dyn CacheStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: IdempotencySettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
            metrics: Arc::new(WebhookMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<WebhookMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn settings(&self) -> &IdempotencySettings {
        &self.settings
    }

    /// Cache key holding the outcome for an event, e.g. `webhook:evt_123`.
    pub fn cache_key(&self, event_id: &str) -> String {
        format!("{}:{}", self.settings.key_prefix, event_id)
    }

    // Kept outside the `{prefix}:` namespace so no event id can collide with it.
    fn lock_key(&self, event_id: &str) -> String {
        format!("{}-lock:{}", self.settings.key_prefix, event_id)
    }

    /// Processes one webhook delivery.
    ///
    /// Returns `Outcome::Success` when this call made the payment and
    /// `Outcome::AlreadyProcessed` when an earlier delivery did. Fails with
    /// `AppError::OperationFailed` when the gateway fails now or failed for an
    /// earlier delivery whose failure is still cached.
    pub async fn process_event(&self, event_id: &str, request: &PaymentRequest) -> Result<Outcome> {
        let timer = LatencyTimer::new();
        self.metrics.record_event();

        let result = self.handle(event_id, request).await;

        get_metrics().record_webhook_duration(timer.elapsed_ms());
        result
    }

    async fn handle(&self, event_id: &str, request: &PaymentRequest) -> Result<Outcome> {
        let key = self.cache_key(event_id);

        if let Some(entry) = self.lookup(&key).await? {
            return self.replay(event_id, entry);
        }

        if !self.settings.in_flight_lock {
            return self.execute(event_id, &key, request).await;
        }

        let lock_key = self.lock_key(event_id);
        let acquired = self
            .store
            .set_if_absent(&lock_key, b"processing", self.settings.lock_ttl_secs)
            .await?;
        if !acquired {
            self.metrics.record_in_flight();
            get_metrics().record_webhook_outcome("in_flight");
            debug!(event_id, "Event is already being processed");
            return Err(AppError::InFlight(event_id.to_string()));
        }

        // Another delivery may have cached its outcome between our read and the lock.
        let result = match self.lookup(&key).await {
            Ok(Some(entry)) => self.replay(event_id, entry),
            Ok(None) => self.execute(event_id, &key, request).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.store.delete(&lock_key).await {
            warn!(event_id, error = %e, "Failed to release in-flight lock; it will expire");
        }

        result
    }

    /// Reads and decodes the entry under `key`. Malformed entries count as absent.
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => match self.settings.read_failure_policy {
                ReadFailurePolicy::FailClosed => return Err(e),
                ReadFailurePolicy::FailOpen => {
                    warn!(key, error = %e, "Cache read failed; processing event as uncached");
                    return Ok(None);
                }
            },
        };

        let Some(raw) = raw else {
            return Ok(None);
        };

        match CacheEntry::decode(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                self.metrics.record_malformed();
                warn!(key, error = %e, "Ignoring malformed cache entry");
                Ok(None)
            }
        }
    }

    fn replay(&self, event_id: &str, entry: CacheEntry) -> Result<Outcome> {
        if let Some(message) = entry.failure_message() {
            self.metrics.record_replayed_failure();
            get_metrics().record_webhook_outcome("replayed_failure");
            debug!(event_id, error = %message, "Replaying cached failure");
            return Err(AppError::OperationFailed(message));
        }

        self.metrics.record_duplicate();
        get_metrics().record_webhook_outcome("already_processed");
        debug!(event_id, "Event already processed");
        Ok(Outcome::AlreadyProcessed {
            event_id: event_id.to_string(),
        })
    }

    async fn execute(&self, event_id: &str, key: &str, request: &PaymentRequest) -> Result<Outcome> {
        match self.gateway.create_payment(request).await {
            Ok(transaction) => {
                let entry = CacheEntry::success(transaction.id.clone());
                if let Err(e) = self.write(key, &entry, self.settings.success_ttl_secs).await {
                    error!(
                        event_id,
                        transaction_id = %transaction.id,
                        error = %e,
                        "Payment succeeded but its outcome could not be cached"
                    );
                    return Err(e);
                }

                self.metrics.record_processed();
                get_metrics().record_webhook_outcome("success");
                info!(event_id, transaction_id = %transaction.id, "Webhook event processed");
                Ok(Outcome::Success {
                    transaction_id: transaction.id,
                })
            }
            Err(gateway_error) => {
                let message = gateway_error.to_string();
                self.metrics.record_failed();

                let entry = CacheEntry::failed(message.clone());
                if let Err(e) = self.write(key, &entry, self.settings.failure_ttl_secs).await {
                    error!(
                        event_id,
                        gateway_error = %message,
                        error = %e,
                        "Payment failed and the failure could not be cached"
                    );
                    return Err(e);
                }

                get_metrics().record_webhook_outcome("failed");
                warn!(event_id, error = %message, "Webhook event failed; failure cached");
                Err(AppError::OperationFailed(message))
            }
        }
    }

    async fn write(&self, key: &str, entry: &CacheEntry, ttl_secs: u64) -> Result<()> {
        let payload = entry.encode()?;
        self.store.set_with_expiry(key, &payload, ttl_secs).await?;
        debug!(key, ttl_secs, "Cached webhook outcome");
        Ok(())
    }

    /// Returns the cached entry for an event, if any.
    pub async fn cached_entry(&self, event_id: &str) -> Result<Option<CacheEntry>> {
        let key = self.cache_key(event_id);
        match self.store.get(&key).await? {
            Some(raw) => CacheEntry::decode(&raw).map(Some).map_err(|e| {
                AppError::Internal(anyhow!("Malformed cache entry under '{}': {}", key, e))
            }),
            None => Ok(None),
        }
    }

    /// Remaining lifetime of the cached entry for an event.
    pub async fn entry_ttl(&self, event_id: &str) -> Result<KeyTtl> {
        self.store.ttl(&self.cache_key(event_id)).await
    }

    /// Deletes the cached entry so the next delivery is processed afresh.
    pub async fn forget(&self, event_id: &str) -> Result<bool> {
        let removed = self.store.delete(&self.cache_key(event_id)).await?;
        if removed {
            info!(event_id, "Cached webhook outcome removed");
        }
        Ok(removed)
    }
}
