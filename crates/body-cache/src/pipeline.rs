//! The body-handling pipeline wired through the cache layer.
//!
//! For every request the pipeline stages the body chunks in a pooled buffer,
//! classifies the `Content-Type` header through the [`ContentTypeCache`](crate::content_type::ContentTypeCache),
//! then answers from the matching parse cache or falls back to a [`BodyDecoder`]
//! and remembers its result. The staging buffer goes back to the pool on every
//! path, including decoder failures.
//!
//! # Example
//! ```
//! use bytes::Bytes;
//! use http::{HeaderMap, HeaderValue, header::CONTENT_TYPE};
//! use micro_body_cache::pipeline::{BodyPipeline, ParsedBody};
//! use micro_body_cache::{BodyCacheContext, CacheConfig};
//! use std::sync::Arc;
//!
//! let pipeline = BodyPipeline::new(Arc::new(BodyCacheContext::new(&CacheConfig::default())));
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
//! let chunks = [Bytes::from_static(br#"{"name":"#), Bytes::from_static(br#""zava"}"#)];
//!
//! let ParsedBody::Json(value) = pipeline.parse(&headers, &chunks).unwrap() else { unreachable!() };
//! assert_eq!(value["name"], "zava");
//! ```

use crate::content_type::ContentType;
use crate::context::BodyCacheContext;
use crate::error::BodyError;
use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Decoded `application/x-www-form-urlencoded` pairs, in body order.
pub type FormFields = Vec<(String, String)>;

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Format decoders invoked on a parse cache miss.
#[cfg_attr(test, mockall::automock)]
pub trait BodyDecoder: Send + Sync {
    fn decode_json(&self, body: &[u8]) -> Result<Value, BodyError>;

    fn decode_form(&self, body: &[u8]) -> Result<FormFields, BodyError>;
}

/// Decodes with `serde_json` and `serde_urlencoded`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeDecoder;

impl BodyDecoder for SerdeDecoder {
    fn decode_json(&self, body: &[u8]) -> Result<Value, BodyError> {
        Ok(serde_json::from_slice(body)?)
    }

    fn decode_form(&self, body: &[u8]) -> Result<FormFields, BodyError> {
        Ok(serde_urlencoded::from_bytes(body)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Arc<Value>),
    Form(Arc<FormFields>),
}

#[derive(Debug)]
pub struct BodyPipeline<D = SerdeDecoder> {
    context: Arc<BodyCacheContext>,
    decoder: D,
}

impl BodyPipeline<SerdeDecoder> {
    pub fn new(context: Arc<BodyCacheContext>) -> Self {
        Self::with_decoder(context, SerdeDecoder)
    }
}

impl<D: BodyDecoder> BodyPipeline<D> {
    pub fn with_decoder(context: Arc<BodyCacheContext>, decoder: D) -> Self {
        Self { context, decoder }
    }

    pub fn context(&self) -> &BodyCacheContext {
        &self.context
    }

    /// Parses a request body that arrived as `chunks`.
    pub fn parse(&self, headers: &HeaderMap, chunks: &[Bytes]) -> Result<ParsedBody, BodyError> {
        let size = chunks.iter().map(Bytes::len).sum();
        let mut staged = self.context.buffers().acquire(size);
        staged.clear();
        for chunk in chunks {
            staged.extend_from_slice(chunk);
        }

        let result = self.parse_staged(headers, &staged);
        self.context.buffers().release(staged);
        result
    }

    fn parse_staged(&self, headers: &HeaderMap, body: &BytesMut) -> Result<ParsedBody, BodyError> {
        let header = headers.get(CONTENT_TYPE).ok_or(BodyError::MissingContentType)?;
        let header = header.to_str().map_err(BodyError::invalid_content_type)?;
        let content_type = self.context.content_types().parse(header, ContentType::parse)?;

        match content_type.media_type() {
            APPLICATION_JSON => {
                let cache = self.context.json();
                if let Some(value) = cache.get(body) {
                    return Ok(ParsedBody::Json(value));
                }
                trace!(len = body.len(), "json parse cache miss");
                let value = Arc::new(self.decoder.decode_json(body)?);
                cache.set(body, Arc::clone(&value));
                Ok(ParsedBody::Json(value))
            }
            FORM_URLENCODED => {
                let cache = self.context.form();
                if let Some(fields) = cache.get(body) {
                    return Ok(ParsedBody::Form(fields));
                }
                trace!(len = body.len(), "form parse cache miss");
                let fields = Arc::new(self.decoder.decode_form(body)?);
                cache.set(body, Arc::clone(&fields));
                Ok(ParsedBody::Form(fields))
            }
            other => Err(BodyError::unsupported_media_type(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use http::HeaderValue;
    use serde_json::json;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    fn context() -> Arc<BodyCacheContext> {
        Arc::new(BodyCacheContext::new(&CacheConfig::default()))
    }

    #[test]
    fn decoder_runs_once_for_repeated_json() {
        let mut decoder = MockBodyDecoder::new();
        decoder.expect_decode_json().times(1).returning(|_| Ok(json!({"id": 1})));
        decoder.expect_decode_form().never();

        let pipeline = BodyPipeline::with_decoder(context(), decoder);
        let body = [Bytes::from_static(br#"{"id":1}"#)];

        let first = pipeline.parse(&headers("application/json"), &body).unwrap();
        let second = pipeline.parse(&headers("application/json; charset=utf-8"), &body).unwrap();
        assert_eq!(first, second);

        let stats = pipeline.context().stats();
        assert_eq!((stats.json.hits, stats.json.misses), (1, 1));
        assert_eq!(stats.content_type.hits, 2);
    }

    #[test]
    fn decoder_failure_is_not_cached() {
        let mut decoder = MockBodyDecoder::new();
        decoder
            .expect_decode_json()
            .times(2)
            .returning(|body| Err(serde_json::from_slice::<Value>(body).unwrap_err().into()));

        let pipeline = BodyPipeline::with_decoder(context(), decoder);
        let body = [Bytes::from_static(b"{not json")];

        for _ in 0..2 {
            let result = pipeline.parse(&headers("application/json"), &body);
            assert!(matches!(result, Err(BodyError::InvalidJson { .. })));
        }
        assert!(pipeline.context().json().is_empty());
    }

    #[test]
    fn form_bodies_use_form_cache() {
        let pipeline = BodyPipeline::new(context());
        let body = [Bytes::from_static(b"name=zava&zip=10001")];

        let parsed = pipeline.parse(&headers("application/x-www-form-urlencoded"), &body).unwrap();
        let ParsedBody::Form(fields) = parsed else { panic!("expected form body") };
        assert_eq!(
            fields.as_slice(),
            &[("name".to_owned(), "zava".to_owned()), ("zip".to_owned(), "10001".to_owned())]
        );
        assert_eq!(pipeline.context().form().len(), 1);
        assert!(pipeline.context().json().is_empty());
    }

    #[test]
    fn staging_buffer_returns_to_pool() {
        let pipeline = BodyPipeline::new(context());
        let body = [Bytes::from_static(b"{}")];

        pipeline.parse(&headers("application/json"), &body).unwrap();
        let _ = pipeline.parse(&headers("text/html"), &body);
        let _ = pipeline.parse(&HeaderMap::new(), &body);

        let stats = pipeline.context().buffers().stats();
        assert_eq!(stats.idle, 1);
        assert_eq!((stats.hits, stats.misses), (2, 1));
    }

    #[test]
    fn rejects_missing_and_unsupported_content_types() {
        let pipeline = BodyPipeline::new(context());
        let body = [Bytes::from_static(b"hello")];

        assert!(matches!(pipeline.parse(&HeaderMap::new(), &body), Err(BodyError::MissingContentType)));
        assert!(matches!(
            pipeline.parse(&headers("text/plain"), &body),
            Err(BodyError::UnsupportedMediaType { media_type }) if media_type == "text/plain"
        ));
        assert!(matches!(pipeline.parse(&headers("json"), &body), Err(BodyError::InvalidContentType { .. })));
    }

    #[test]
    fn oversized_bodies_are_parsed_but_not_cached() {
        let mut config = CacheConfig::default();
        config.json.max_body_size = 16;
        let pipeline = BodyPipeline::new(Arc::new(BodyCacheContext::new(&config)));

        let body = [Bytes::from(format!(r#"{{"padding":"{}"}}"#, "x".repeat(32)))];
        for _ in 0..2 {
            let parsed = pipeline.parse(&headers("application/json"), &body).unwrap();
            assert!(matches!(parsed, ParsedBody::Json(_)));
        }
        assert!(pipeline.context().json().is_empty());
        assert_eq!(pipeline.context().json().stats().misses, 2);
    }
}
