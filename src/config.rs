use crate::error::Result;
use serde::Deserialize;
use validator::Validate;

pub const DEFAULT_KEY_PREFIX: &str = "webhook";
pub const DEFAULT_SUCCESS_TTL_SECS: u64 = 86400;
pub const DEFAULT_FAILURE_TTL_SECS: u64 = 3600;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;
/// Upper bound for any configured TTL (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub redis: RedisSettings,
    pub idempotency: IdempotencySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

/// What to do when the cache store cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Propagate the store error; the event is not processed.
    #[default]
    FailClosed,
    /// Treat the event as uncached and process it.
    FailOpen,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdempotencySettings {
    #[validate(length(min = 1))]
    pub key_prefix: String,
    #[validate(range(min = 1, max = "MAX_TTL_SECS"))]
    pub success_ttl_secs: u64,
    #[validate(range(min = 1, max = "MAX_TTL_SECS"))]
    pub failure_ttl_secs: u64,
    #[serde(default)]
    pub read_failure_policy: ReadFailurePolicy,
    #[serde(default)]
    pub in_flight_lock: bool,
    #[validate(range(min = 1, max = "MAX_TTL_SECS"))]
    pub lock_ttl_secs: u64,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            success_ttl_secs: DEFAULT_SUCCESS_TTL_SECS,
            failure_ttl_secs: DEFAULT_FAILURE_TTL_SECS,
            read_failure_policy: ReadFailurePolicy::FailClosed,
            in_flight_lock: false,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Settings {
    /// Loads settings from defaults, `config/default`, `config/local` and `APP__*` env vars.
    pub fn new() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .set_default("redis.url", "redis://127.0.0.1:6379/0")?
            .set_default("idempotency.key_prefix", DEFAULT_KEY_PREFIX)?
            .set_default("idempotency.success_ttl_secs", DEFAULT_SUCCESS_TTL_SECS)?
            .set_default("idempotency.failure_ttl_secs", DEFAULT_FAILURE_TTL_SECS)?
            .set_default("idempotency.lock_ttl_secs", DEFAULT_LOCK_TTL_SECS)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.idempotency.validate()?;
        Ok(settings)
    }
}
