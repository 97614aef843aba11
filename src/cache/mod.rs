//! Rate-limited indicator cache

pub mod backoff;
pub mod indicator_cache;

pub use backoff::{BackoffConfig, BackoffState};
pub use indicator_cache::{CacheConfig, CacheEntry, CacheKey, IndicatorCache};
