//! Tunables for the buffer pool and the parse caches.
//!
//! Every struct implements [`Default`] with values sized for bursts of small
//! JSON and form requests, and [`serde::Deserialize`] so a host can load them
//! from its own configuration file. Durations are written as milliseconds.
//!
//! ```
//! use micro_body_cache::config::CacheConfig;
//! use std::time::Duration;
//!
//! let config: CacheConfig = serde_json::from_str(r#"{ "json": { "ttl": 5000 } }"#).unwrap();
//! assert_eq!(config.json.ttl, Duration::from_secs(5));
//! assert_eq!(config.form.max_entries, 1000);
//! ```

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub buffer_pool: BufferPoolConfig,
    pub content_type: ContentTypeConfig,
    pub json: BodyCacheConfig,
    pub form: BodyCacheConfig,
    /// how often expired parse results are swept
    #[serde(with = "millis")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            buffer_pool: BufferPoolConfig::default(),
            content_type: ContentTypeConfig::default(),
            json: BodyCacheConfig::default(),
            form: BodyCacheConfig::default(),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// the nominal buffer size, buffers up to twice this capacity are pooled
    pub buffer_size: usize,
    /// max idle buffers kept for reuse
    pub max_pooled: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { buffer_size: 8 * 1024, max_pooled: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentTypeConfig {
    /// max entries on top of the seeded ones
    pub max_entries: usize,
}

impl Default for ContentTypeConfig {
    fn default() -> Self {
        Self { max_entries: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BodyCacheConfig {
    #[serde(with = "millis")]
    pub ttl: Duration,
    pub max_entries: usize,
    /// bodies longer than this are never cached
    pub max_body_size: usize,
}

impl Default for BodyCacheConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60), max_entries: 1000, max_body_size: 10 * 1024 }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
