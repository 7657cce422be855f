//! Memoized `Content-Type` header parsing.
//!
//! A handful of header values make up nearly all body-carrying traffic, so the
//! cache is seeded with them at construction and [`ContentTypeCache::clear`]
//! always restores that baseline. Other header strings are parsed once through
//! the caller's parser and kept, up to a configured number of extra entries.
//! Media types never go stale, so entries carry no expiry.

use crate::config::ContentTypeConfig;
use crate::error::MediaTypeError;
use crate::utils::hit_rate;
use mime::Mime;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A parsed media type: the lowercase `type/subtype` and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    parameters: HashMap<String, String>,
}

impl ContentType {
    pub fn new<S: Into<String>>(media_type: S) -> Self {
        Self { media_type: media_type.into(), parameters: HashMap::new() }
    }

    #[must_use]
    pub fn with_param<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// The default header parser, built on the `mime` crate.
    ///
    /// Type, subtype and parameter names are lowercased; parameter values are
    /// kept as written.
    pub fn parse(header: &str) -> Result<Self, MediaTypeError> {
        let mime: Mime = header.trim().parse().map_err(|source| MediaTypeError::invalid(header, source))?;
        let parameters =
            mime.params().map(|(name, value)| (name.as_str().to_ascii_lowercase(), value.as_str().to_owned())).collect();
        Ok(Self { media_type: mime.essence_str().to_ascii_lowercase(), parameters })
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const TEXT_PLAIN: &str = "text/plain";

fn seeded_entries() -> HashMap<String, Arc<ContentType>> {
    let mut entries = HashMap::new();
    for media_type in [APPLICATION_JSON, FORM_URLENCODED, TEXT_PLAIN] {
        entries.insert(media_type.to_owned(), Arc::new(ContentType::new(media_type)));
        entries.insert(
            format!("{media_type}; charset=utf-8"),
            Arc::new(ContentType::new(media_type).with_param("charset", "utf-8")),
        );
    }
    entries
}

#[derive(Debug)]
pub struct ContentTypeCache {
    max_entries: usize,
    seeded: usize,
    inner: Mutex<ContentTypeState>,
}

#[derive(Debug)]
struct ContentTypeState {
    entries: HashMap<String, Arc<ContentType>>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContentTypeStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl ContentTypeCache {
    pub fn new(config: &ContentTypeConfig) -> Self {
        let entries = seeded_entries();
        Self {
            max_entries: config.max_entries,
            seeded: entries.len(),
            inner: Mutex::new(ContentTypeState { entries, hits: 0, misses: 0 }),
        }
    }

    /// Looks `header` up, falling back to `parse_fn` on a miss.
    ///
    /// A parser error is returned untouched and nothing is stored for it. The
    /// parser runs without the cache lock held, so two threads missing on the
    /// same header at once may both invoke it.
    pub fn parse<F, E>(&self, header: &str, parse_fn: F) -> Result<Arc<ContentType>, E>
    where
        F: FnOnce(&str) -> Result<ContentType, E>,
    {
        {
            let mut state = self.inner.lock();
            if let Some(found) = state.entries.get(header).cloned() {
                state.hits += 1;
                return Ok(found);
            }
        }

        let parsed = Arc::new(parse_fn(header)?);

        let mut state = self.inner.lock();
        if state.entries.len() - self.seeded < self.max_entries {
            state.entries.entry(header.to_owned()).or_insert_with(|| Arc::clone(&parsed));
        } else {
            trace!(header, "content type cache full, not storing");
        }
        state.misses += 1;
        Ok(parsed)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Number of entries present straight after construction or [`clear`](Self::clear).
    pub fn seeded_size(&self) -> usize {
        self.seeded
    }

    pub fn stats(&self) -> ContentTypeStats {
        let state = self.inner.lock();
        ContentTypeStats {
            size: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            hit_rate: hit_rate(state.hits, state.misses),
        }
    }

    /// Resets to the seeded entries and zeroes the counters.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.entries = seeded_entries();
        state.hits = 0;
        state.misses = 0;
    }
}
