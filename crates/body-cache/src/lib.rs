//! Buffer pooling and parse caching in front of the micro http body pipeline.
//!
//! Servers handling bursts of structurally similar requests spend much of their
//! time redoing the same work: allocating staging buffers, parsing the same
//! `Content-Type` strings and decoding identical bodies. This crate keeps that
//! work from being repeated.
//!
//! # Components
//!
//! - [`BufferPool`]: bounded, zero-on-release pool of staging buffers
//! - [`ContentTypeCache`]: seeded cache of parsed media types
//! - [`BodyParseCache`]: TTL-bounded, FIFO-evicted cache of body parse results,
//!   one instance per body format
//! - [`CleanupScheduler`]: background task sweeping expired parse results
//! - [`BodyCacheContext`]: one instance of each, passed through the pipeline
//! - [`pipeline::BodyPipeline`]: the request flow tying them together
//!
//! # Example
//!
//! ```no_run
//! use micro_body_cache::{BodyCacheContext, CacheConfig};
//! use micro_body_cache::pipeline::BodyPipeline;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = Arc::new(BodyCacheContext::new(&CacheConfig::default()));
//!     let _cleanup = context.start_cleanup();
//!
//!     let pipeline = BodyPipeline::new(Arc::clone(&context));
//!     // hand `pipeline` to the request handlers ...
//! #   drop(pipeline);
//! }
//! ```
//!
//! # Concurrency
//!
//! Every component guards its state, counters included, with a single mutex, so
//! each operation is atomic as a whole. Caller supplied parsers are never run
//! while a lock is held.

pub mod buffer_pool;
pub mod cleanup;
pub mod clock;
pub mod config;
pub mod content_type;
pub mod context;
pub mod error;
pub mod key;
pub mod parse_cache;
pub mod pipeline;

mod utils;

pub use buffer_pool::BufferPool;
pub use cleanup::CleanupScheduler;
pub use config::CacheConfig;
pub use content_type::{ContentType, ContentTypeCache};
pub use context::BodyCacheContext;
pub use error::{BodyError, MediaTypeError};
pub use key::CacheKey;
pub use parse_cache::{BodyParseCache, Sweep};
