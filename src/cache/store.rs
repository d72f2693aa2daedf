use crate::error::Result;
use async_trait::async_trait;

/// Remaining lifetime of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist or has expired.
    Missing,
    /// Key exists without an expiry.
    Persistent,
    /// Key expires in this many seconds.
    Expires(u64),
}

impl KeyTtl {
    /// Maps a Redis `TTL` reply (-2 missing, -1 no expiry) to a `KeyTtl`.
    pub fn from_redis_reply(reply: i64) -> Self {
        match reply {
            -1 => KeyTtl::Persistent,
            secs if secs >= 0 => KeyTtl::Expires(secs as u64),
            _ => KeyTtl::Missing,
        }
    }

    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            KeyTtl::Expires(secs) => Some(*secs),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, KeyTtl::Missing)
    }
}

/// Key-value store with per-key expiry shared by every processor instance.
///
/// Each call is atomic on its own. Nothing here makes a sequence of calls atomic.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored value, or `None` if the key is missing or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value`, replacing any existing value, expiring `ttl_seconds` from now.
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// Stores `value` only if the key does not exist. Returns true if it was stored.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<bool>;

    /// Deletes a key. Returns true if something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}
