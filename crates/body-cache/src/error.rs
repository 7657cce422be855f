use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaTypeError {
    #[error("invalid media type {header:?}: {source}")]
    Invalid {
        header: String,
        #[source]
        source: mime::FromStrError,
    },

    #[error("unreadable media type: {reason}")]
    Unreadable { reason: String },
}

impl MediaTypeError {
    pub fn invalid<S: ToString>(header: S, source: mime::FromStrError) -> Self {
        Self::Invalid { header: header.to_string(), source }
    }
}

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("missing content-type header")]
    MissingContentType,

    #[error("invalid content-type header: {source}")]
    InvalidContentType {
        #[from]
        source: MediaTypeError,
    },

    #[error("unsupported media type: {media_type}")]
    UnsupportedMediaType { media_type: String },

    #[error("invalid json body: {source}")]
    InvalidJson {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {source}")]
    InvalidForm {
        #[from]
        source: serde_urlencoded::de::Error,
    },
}

impl BodyError {
    pub fn unsupported_media_type<S: ToString>(media_type: S) -> Self {
        Self::UnsupportedMediaType { media_type: media_type.to_string() }
    }

    pub fn invalid_content_type<S: ToString>(reason: S) -> Self {
        Self::InvalidContentType { source: MediaTypeError::Unreadable { reason: reason.to_string() } }
    }
}
