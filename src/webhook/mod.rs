pub mod entry;
pub mod processor;

pub use entry::{CacheEntry, Outcome, DEFAULT_FAILURE_MESSAGE};
pub use processor::{MetricsSnapshot, WebhookMetrics, WebhookProcessor};
