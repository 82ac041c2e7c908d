//! Error types for the Parse REST client.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the object does not exist" from other server refusals. Every other
//! unsuccessful reply lands in `Api` with the status and Parse's `code` /
//! `error` fields. Transport failures never produce a `Reply`; they surface
//! as `Transport` straight from `dispatch`.

use thiserror::Error;

/// Errors returned by `ParseClient` and the resource helpers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server answered with a non-2xx status or a JSON `error` field.
    #[error("HTTP {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A JSON response body could not be parsed.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A class name, id or file name that cannot be used as a path segment.
    #[error("invalid path segment {0:?}")]
    InvalidPath(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Parse error code, when the server supplied one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ApiError::Api { code, .. } => *code,
            _ => None,
        }
    }
}
