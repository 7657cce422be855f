//! The handle that bundles one instance of every cache component.
//!
//! A [`BodyCacheContext`] is built once at startup and shared with the request
//! pipeline. [`BodyCacheContext::global`] hands out a lazily built process-wide
//! default, while tests and embedders that need isolation construct their own.

use crate::buffer_pool::{BufferPool, PoolStats};
use crate::cleanup::CleanupScheduler;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::content_type::{ContentTypeCache, ContentTypeStats};
use crate::parse_cache::{BodyParseCache, CacheStats, Sweep};
use crate::pipeline::FormFields;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub type JsonCache = BodyParseCache<Arc<Value>>;
pub type FormCache = BodyParseCache<Arc<FormFields>>;

#[derive(Debug)]
pub struct BodyCacheContext {
    buffers: BufferPool,
    content_types: ContentTypeCache,
    json: Arc<JsonCache>,
    form: Arc<FormCache>,
    cleanup_interval: Duration,
}

static GLOBAL_CONTEXT: Lazy<Arc<BodyCacheContext>> = Lazy::new(|| Arc::new(BodyCacheContext::new(&CacheConfig::default())));

/// Counters of every component, serializable for operator endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContextStats {
    pub buffer_pool: PoolStats,
    pub content_type: ContentTypeStats,
    pub json: CacheStats,
    pub form: CacheStats,
}

impl BodyCacheContext {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds a context whose parse caches read time from `clock`.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buffers: BufferPool::new(&config.buffer_pool),
            content_types: ContentTypeCache::new(&config.content_type),
            json: Arc::new(BodyParseCache::with_clock("json", &config.json, Arc::clone(&clock))),
            form: Arc::new(BodyParseCache::with_clock("form", &config.form, clock)),
            cleanup_interval: config.cleanup_interval,
        }
    }

    /// Returns the process-wide context built from [`CacheConfig::default`].
    pub fn global() -> Arc<BodyCacheContext> {
        Arc::clone(&GLOBAL_CONTEXT)
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    pub fn content_types(&self) -> &ContentTypeCache {
        &self.content_types
    }

    pub fn json(&self) -> &JsonCache {
        &self.json
    }

    pub fn form(&self) -> &FormCache {
        &self.form
    }

    /// Starts sweeping both parse caches on the configured interval.
    ///
    /// The returned scheduler stops when dropped, so keep it alive for as long
    /// as sweeping is wanted.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    #[must_use = "dropping the scheduler stops the cleanup task"]
    pub fn start_cleanup(&self) -> CleanupScheduler {
        let caches: Vec<Arc<dyn Sweep>> = vec![Arc::clone(&self.json) as Arc<dyn Sweep>, Arc::clone(&self.form) as Arc<dyn Sweep>];
        CleanupScheduler::start(caches, self.cleanup_interval)
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            buffer_pool: self.buffers.stats(),
            content_type: self.content_types.stats(),
            json: self.json.stats(),
            form: self.form.stats(),
        }
    }

    pub fn clear(&self) {
        self.buffers.clear();
        self.content_types.clear();
        self.json.clear();
        self.form.clear();
    }
}
