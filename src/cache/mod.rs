//! Quire cache system
//!
//! Two tiers in front of the post store:
//!
//! - **Memory tier**: process-local, every entry capped at a short ceiling
//! - **Backing tier**: shared Redis, or a no-op stand-in when none is configured
//!
//! Request handlers only see [`TieredCache`] and [`PostIndexCache`]; the write
//! path reaches the cache through [`CacheHooks`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! redis_url = "redis://127.0.0.1:6379"
//! entity_ttl_seconds = 3600
//! l1_max_ttl_seconds = 60
//! index_ttl_seconds = 30
//! # ... see config.rs for all options
//! ```

mod aggregate;
pub mod backing;
mod config;
mod error;
mod facade;
mod hooks;
mod keys;
mod memory;

pub use aggregate::PostIndexCache;
pub use backing::{BackingMode, BackingStore, NoopStore, RedisStore};
pub use config::CacheConfig;
pub use error::CacheError;
pub use facade::TieredCache;
pub use hooks::{CacheHooks, Epoch, HookEvent, HookKind, HookOutcome};
pub use keys::{CacheKey, POST_INDEX_PREFIX, POST_PREFIX, POST_SCAN_PATTERN, is_index_key};
pub use memory::MemoryCache;
