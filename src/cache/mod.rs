pub mod memory_store;
pub mod redis_store;
pub mod store;

pub use memory_store::{ExpirySweeper, InMemoryCacheStore};
pub use redis_store::RedisCacheStore;
pub use store::{CacheStore, KeyTtl};
