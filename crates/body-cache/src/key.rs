//! Cache key derivation for request bodies.
//!
//! Short bodies are cheap to compare and store, so they key the cache directly.
//! Anything at or above [`INLINE_KEY_LIMIT`] bytes is replaced by its SHA-256
//! digest, which keeps key storage bounded no matter how large the body is.

use sha2::{Digest, Sha256};
use std::fmt;

/// Bodies shorter than this many bytes are used verbatim as their own key.
pub const INLINE_KEY_LIMIT: usize = 100;

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Inline(Box<[u8]>),
    Digest([u8; 32]),
}

impl CacheKey {
    pub fn derive(body: &[u8]) -> Self {
        if body.len() < INLINE_KEY_LIMIT {
            CacheKey::Inline(body.into())
        } else {
            CacheKey::Digest(Sha256::digest(body).into())
        }
    }

    pub fn is_digest(&self) -> bool {
        matches!(self, CacheKey::Digest(_))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Inline(raw) => write!(f, "Inline({:?})", String::from_utf8_lossy(raw)),
            CacheKey::Digest(digest) => {
                f.write_str("Digest(")?;
                for byte in digest {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str(")")
            }
        }
    }
}
