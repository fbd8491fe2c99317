//! Request normalization.
//!
//! Turns an outgoing client request into the canonical form the registry
//! matches against: upper-case method, the path as sent, a flat query map and
//! the body fully drained, decompressed and parsed as JSON (or as a list of
//! JSON values for newline-delimited bodies).

use crate::error::MockError;
use bytes::{Bytes, BytesMut};
use flate2::read::GzDecoder;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, Read};
use std::pin::Pin;
use tracing::trace;

/// A live request body that yields chunks until exhausted.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Body of an outgoing request as the client hands it over.
pub enum RequestBody {
    Bytes(Bytes),
    Text(String),
    Stream(BodyStream),
}

impl RequestBody {
    /// Wrap a chunk stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        RequestBody::Stream(Box::pin(stream))
    }

    /// Drain the body into a single buffer.
    async fn collect(self) -> Result<Bytes, MockError> {
        match self {
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::Text(text) => Ok(Bytes::from(text)),
            RequestBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk
                        .map_err(|e| MockError::connection_with("Failed to read request body", e))?;
                    trace!(len = chunk.len(), "Received body chunk");
                    buf.extend_from_slice(&chunk);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

/// An outgoing request, as received by the connection.
#[derive(Debug)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    /// Query string without the leading `?`
    pub querystring: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<RequestBody>,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            querystring: None,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_querystring(mut self, querystring: impl Into<String>) -> Self {
        self.querystring = Some(querystring.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }
}

/// Canonical request the registry resolves against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRequest {
    pub method: String,
    pub path: String,
    #[serde(rename = "querystring")]
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Named path parameters bound by the matched route
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl NormalizedRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }
}

/// Normalize an outgoing request.
///
/// Suspends only while draining a streamed body. Read, decompression and
/// parse failures are reported as [`MockError::Connection`].
pub async fn normalize(request: RawRequest) -> Result<NormalizedRequest, MockError> {
    let RawRequest {
        method,
        path,
        querystring,
        headers,
        body,
    } = request;

    let (path, querystring) = split_query(path, querystring);
    let query = parse_query_string(querystring.as_deref().unwrap_or(""));

    let body = match body {
        None => None,
        Some(body) => {
            let gzip = header(&headers, "content-encoding")
                .is_some_and(|v| v.to_ascii_lowercase().contains("gzip"));
            let ndjson = header(&headers, "content-type")
                .is_some_and(|v| v.to_ascii_lowercase().contains("ndjson"));

            let raw = body.collect().await?;
            let raw = if gzip { gunzip(&raw)? } else { raw };
            parse_body(&raw, ndjson)?
        }
    };

    Ok(NormalizedRequest {
        method: method.to_ascii_uppercase(),
        path,
        query,
        body,
        params: BTreeMap::new(),
    })
}

/// Parse a query string into a flat map. Repeated keys keep the last value.
pub fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

/// Case-insensitive header lookup.
pub(crate) fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn split_query(path: String, querystring: Option<String>) -> (String, Option<String>) {
    match path.split_once('?') {
        Some((p, q)) if querystring.is_none() => (p.to_string(), Some(q.to_string())),
        Some((p, _)) => (p.to_string(), querystring),
        None => (path, querystring),
    }
}

fn gunzip(raw: &[u8]) -> Result<Bytes, MockError> {
    let mut out = Vec::new();
    GzDecoder::new(raw)
        .read_to_end(&mut out)
        .map_err(|e| MockError::connection_with("Failed to decompress request body", e))?;
    Ok(Bytes::from(out))
}

fn parse_body(raw: &[u8], ndjson: bool) -> Result<Option<Value>, MockError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| MockError::connection_with("Request body is not valid UTF-8", e))?;

    if ndjson {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MockError::connection_with("Malformed ndjson request body", e))?;
        return Ok(Some(Value::Array(lines)));
    }

    if text.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| MockError::connection_with("Malformed JSON request body", e))
}
