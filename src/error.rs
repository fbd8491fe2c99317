//! Error types surfaced by the mock.
//!
//! Everything the registry, the normalizer or the connection can fail with is
//! a [`MockError`]. A [`ResponseError`] is not an error of the mock itself: it
//! is a pre-built error response a resolver hands back to be delivered as-is.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Boxed source error carried by connection failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the mock or propagated from a resolver.
#[derive(Debug, Error)]
pub enum MockError {
    /// Malformed pattern passed to a registration API.
    #[error("{0}")]
    Configuration(String),

    /// Failure while reading, decompressing or parsing a request body.
    #[error("{message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The request was cancelled before a response was delivered.
    #[error("Request aborted")]
    RequestAborted,

    /// Transport timeout, only ever produced by a resolver.
    #[error("{0}")]
    Timeout(String),

    /// No usable node left, only ever produced by a resolver.
    #[error("{0}")]
    NoLivingConnections(String),

    #[error("{0}")]
    Serialization(String),

    #[error("{0}")]
    Deserialization(String),
}

impl MockError {
    pub fn configuration(message: impl Into<String>) -> Self {
        MockError::Configuration(message.into())
    }

    /// Connection error without an underlying cause.
    pub fn connection(message: impl Into<String>) -> Self {
        MockError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Connection error wrapping the failure that caused it.
    pub fn connection_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        MockError::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, MockError::Configuration(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, MockError::Connection { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, MockError::RequestAborted)
    }
}

/// A complete error response, delivered with its own status and body.
///
/// String bodies are sent as plain text, anything else as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseError {
    pub status_code: u16,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl ResponseError {
    pub fn new(status_code: u16, body: impl Into<Value>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a header to the delivered response.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// A search-engine style error document, e.g. `index_not_found_exception`.
    pub fn search_exception(status_code: u16, kind: &str, reason: &str) -> Self {
        let cause = serde_json::json!({ "type": kind, "reason": reason });
        Self::new(
            status_code,
            serde_json::json!({
                "error": {
                    "root_cause": [cause.clone()],
                    "type": kind,
                    "reason": reason,
                },
                "status": status_code,
            }),
        )
    }
}
