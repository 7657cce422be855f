//! Reusable staging buffers for request bodies.
//!
//! The pool keeps a small, bounded list of idle [`BytesMut`] buffers. Requests
//! up to twice the configured size class are served first-fit from that list,
//! larger ones bypass the pool entirely. Every buffer is zero-filled across its
//! whole capacity when it is released, so bytes from one request can never be
//! observed by the next holder of the same allocation.
//!
//! A buffer handed out from the pool is trimmed with [`BytesMut::truncate`], which
//! keeps the backing storage. Its full capacity is therefore reclaimed when it is
//! released again.

use crate::config::BufferPoolConfig;
use crate::utils::hit_rate;
use bytes::BytesMut;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    max_pooled: usize,
    inner: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<BytesMut>,
    hits: u64,
    misses: u64,
}

/// A snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoolStats {
    pub idle: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl BufferPool {
    pub fn new(config: &BufferPoolConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            max_pooled: config.max_pooled,
            inner: Mutex::new(PoolState { idle: Vec::with_capacity(config.max_pooled), ..PoolState::default() }),
        }
    }

    #[inline]
    fn max_poolable(&self) -> usize {
        self.buffer_size.saturating_mul(2)
    }

    /// Returns a zeroed buffer whose length is exactly `size`.
    ///
    /// Never fails: when no idle buffer fits, a fresh one is allocated. Fresh
    /// allocations for poolable sizes get at least the size class as capacity so
    /// they can serve later typical requests once released.
    pub fn acquire(&self, size: usize) -> BytesMut {
        if size > self.max_poolable() {
            self.inner.lock().misses += 1;
            trace!(size, "buffer too large for pool, allocating");
            return BytesMut::zeroed(size);
        }

        let mut state = self.inner.lock();
        if let Some(index) = state.idle.iter().position(|buf| buf.capacity() >= size) {
            let mut buf = state.idle.swap_remove(index);
            state.hits += 1;
            drop(state);

            buf.truncate(size);
            return buf;
        }
        state.misses += 1;
        drop(state);

        let mut buf = BytesMut::zeroed(size.max(self.buffer_size));
        buf.truncate(size);
        buf
    }

    /// Hands a buffer back for reuse.
    ///
    /// Buffers above twice the size class, or arriving while the idle list is
    /// full, are dropped.
    pub fn release(&self, mut buf: BytesMut) {
        let capacity = buf.capacity();
        if capacity > self.max_poolable() {
            return;
        }

        // zero the whole allocation, not just the visible part
        buf.clear();
        buf.resize(capacity, 0);

        let mut state = self.inner.lock();
        if state.idle.len() < self.max_pooled {
            state.idle.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        PoolStats { idle: state.idle.len(), hits: state.hits, misses: state.misses, hit_rate: hit_rate(state.hits, state.misses) }
    }

    /// Drops every idle buffer and resets the counters.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.idle.clear();
        state.hits = 0;
        state.misses = 0;
    }
}
