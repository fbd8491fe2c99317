//! Connection adapter.
//!
//! [`MockConnection`] stands where the search client expects its network
//! transport. Every request is normalized, resolved against the registry as it
//! is at resolution time, and answered with a synthesized response shaped like
//! the real transport's.

use crate::config::GlobalSettings;
use crate::error::{MockError, ResponseError};
use crate::normalize::{normalize, NormalizedRequest, RawRequest};
use crate::pattern::Reply;
use crate::registry::{Registry, Resolution};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain;charset=utf-8";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// The single capability the search client needs from its transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request.
    ///
    /// Once `signal` is cancelled the call resolves to
    /// [`MockError::RequestAborted`] and nothing else.
    async fn request(
        &self,
        request: RawRequest,
        signal: Option<CancellationToken>,
    ) -> Result<TransportResponse, MockError>;
}

/// Response handed back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl TransportResponse {
    fn new(status_code: u16, content_type: &str, body: Bytes, settings: &GlobalSettings) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert("content-length".to_string(), body.len().to_string());
        headers.insert("date".to_string(), chrono::Utc::now().format(HTTP_DATE_FORMAT).to_string());
        headers.insert("connection".to_string(), "keep-alive".to_string());
        if let Some(product) = &settings.product_header {
            headers.insert("x-elastic-product".to_string(), product.clone());
        }

        Self {
            status_code,
            headers,
            body,
        }
    }

    fn json(status_code: u16, body: &Value, settings: &GlobalSettings) -> Result<Self, MockError> {
        let bytes = serde_json::to_vec(body).map_err(|e| MockError::Serialization(e.to_string()))?;
        Ok(Self::new(status_code, JSON_CONTENT_TYPE, Bytes::from(bytes), settings))
    }

    fn text(status_code: u16, body: String, settings: &GlobalSettings) -> Self {
        Self::new(status_code, TEXT_CONTENT_TYPE, Bytes::from(body), settings)
    }

    fn from_error(error: ResponseError, settings: &GlobalSettings) -> Result<Self, MockError> {
        let mut response = match error.body {
            Value::String(text) => Self::text(error.status_code, text, settings),
            body => Self::json(error.status_code, &body, settings)?,
        };
        // content-length always describes the delivered body
        response.headers.extend(
            error
                .headers
                .into_iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("content-length")),
        );
        Ok(response)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON.
    pub fn body_json(&self) -> Result<Value, MockError> {
        serde_json::from_slice(&self.body).map_err(|e| MockError::Deserialization(e.to_string()))
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport that answers from the pattern registry.
#[derive(Debug, Clone)]
pub struct MockConnection {
    registry: Arc<RwLock<Registry>>,
    settings: Arc<GlobalSettings>,
}

impl MockConnection {
    pub fn new(registry: Arc<RwLock<Registry>>, settings: Arc<GlobalSettings>) -> Self {
        Self { registry, settings }
    }

    fn resolve(&self, request: &NormalizedRequest) -> Option<Resolution> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(request)
    }

    async fn handle(&self, request: RawRequest) -> Result<TransportResponse, MockError> {
        let mut request = normalize(request).await?;

        let Some(resolution) = self.resolve(&request) else {
            if self.settings.log_unmatched {
                warn!(
                    method = %request.method,
                    path = %request.path,
                    "No mock pattern matched request"
                );
            }
            return self.not_found(&request);
        };

        if self.settings.log_matches {
            info!(
                method = %request.method,
                path = %request.path,
                route = %resolution.route,
                specificity = resolution.specificity,
                "Request matched mock pattern"
            );
        }

        request.params = resolution.params;
        match (resolution.resolver)(&request)? {
            Reply::Json(body) => TransportResponse::json(200, &body, &self.settings),
            Reply::Text(body) => Ok(TransportResponse::text(200, body, &self.settings)),
            Reply::Error(error) => TransportResponse::from_error(error, &self.settings),
        }
    }

    fn not_found(&self, request: &NormalizedRequest) -> Result<TransportResponse, MockError> {
        let mut body = serde_json::json!({ "error": "Mock not found" });
        if self.settings.echo_unmatched {
            body["request"] =
                serde_json::to_value(request).map_err(|e| MockError::Serialization(e.to_string()))?;
        }
        TransportResponse::json(404, &body, &self.settings)
    }
}

#[async_trait]
impl Transport for MockConnection {
    async fn request(
        &self,
        request: RawRequest,
        signal: Option<CancellationToken>,
    ) -> Result<TransportResponse, MockError> {
        let Some(signal) = signal else {
            return self.handle(request).await;
        };

        if signal.is_cancelled() {
            debug!(method = %request.method, path = %request.path, "Request aborted before start");
            return Err(MockError::RequestAborted);
        }

        tokio::select! {
            biased;
            _ = signal.cancelled() => {
                debug!("Request aborted while in flight");
                Err(MockError::RequestAborted)
            }
            result = self.handle(request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RequestBody;
    use crate::pattern::{Pattern, Resolver};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn connection(settings: GlobalSettings) -> (Arc<RwLock<Registry>>, MockConnection) {
        let registry = Arc::new(RwLock::new(Registry::new()));
        let conn = MockConnection::new(registry.clone(), Arc::new(settings));
        (registry, conn)
    }

    fn resolver<F>(f: F) -> Option<Resolver>
    where
        F: Fn(&NormalizedRequest) -> Result<Reply, MockError> + Send + Sync + 'static,
    {
        Some(Arc::new(f))
    }

    fn register(registry: &Arc<RwLock<Registry>>, pattern: Pattern, resolver: Option<Resolver>) {
        registry.write().unwrap().register(&pattern, resolver).unwrap();
    }

    #[tokio::test]
    async fn test_json_reply() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(&registry, Pattern::route("GET", "/a"), resolver(|_| Ok(json!({ "status": "ok" }).into())));

        let response = conn.request(RawRequest::new("GET", "/a"), None).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.header("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(response.body_json().unwrap(), json!({ "status": "ok" }));
        assert_eq!(response.header("content-length"), Some("15"));
        assert_eq!(response.header("connection"), Some("keep-alive"));
        assert_eq!(response.header("x-elastic-product"), Some("Elasticsearch"));
        let date = response.header("date").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(date, HTTP_DATE_FORMAT).is_ok());
        assert!(date.ends_with(" GMT"));
    }

    #[tokio::test]
    async fn test_response_error_cannot_override_content_length() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(
            &registry,
            Pattern::route("GET", "/_cat/health"),
            resolver(|_| {
                Ok(ResponseError::new(503, "red")
                    .with_header("Content-Length", "999")
                    .with_header("Content-Type", "text/csv")
                    .into())
            }),
        );

        let response = conn.request(RawRequest::new("GET", "/_cat/health"), None).await.unwrap();
        assert_eq!(response.status_code, 503);
        assert_eq!(response.header("content-length"), Some("3"));
        assert_eq!(response.header("content-type"), Some("text/csv"));
        assert_eq!(response.body_text(), "red");
    }

    #[tokio::test]
    async fn test_not_found() {
        let (_registry, conn) = connection(GlobalSettings::default());

        let response = conn.request(RawRequest::new("GET", "/b"), None).await.unwrap();
        assert_eq!(response.status_code, 404);
        assert_eq!(response.body_json().unwrap(), json!({ "error": "Mock not found" }));
    }

    #[tokio::test]
    async fn test_not_found_echoes_request() {
        let settings = GlobalSettings {
            echo_unmatched: true,
            ..GlobalSettings::default()
        };
        let (_registry, conn) = connection(settings);

        let response = conn
            .request(
                RawRequest::new("POST", "/_search")
                    .with_querystring("q=1")
                    .with_body(r#"{"size":0}"#),
                None,
            )
            .await
            .unwrap();
        let body = response.body_json().unwrap();
        assert_eq!(body["error"], "Mock not found");
        assert_eq!(body["request"]["method"], "POST");
        assert_eq!(body["request"]["querystring"]["q"], "1");
        assert_eq!(body["request"]["body"], json!({ "size": 0 }));
    }

    #[tokio::test]
    async fn test_text_reply() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(&registry, Pattern::route("GET", "/_cat/health"), resolver(|_| Ok("green".into())));

        let response = conn.request(RawRequest::new("GET", "/_cat/health"), None).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.header("content-type"), Some(TEXT_CONTENT_TYPE));
        assert_eq!(response.body_text(), "green");
    }

    #[tokio::test]
    async fn test_response_error_reply() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(
            &registry,
            Pattern::route("GET", "/:index/_doc/:id"),
            resolver(|_| {
                Ok(ResponseError::search_exception(404, "index_not_found_exception", "no such index")
                    .with_header("Warning", "299 mock")
                    .into())
            }),
        );

        let response = conn.request(RawRequest::new("GET", "/test/_doc/1"), None).await.unwrap();
        assert_eq!(response.status_code, 404);
        assert_eq!(response.header("warning"), Some("299 mock"));
        assert_eq!(
            response.body_json().unwrap()["error"]["type"],
            "index_not_found_exception"
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_propagated() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(
            &registry,
            Pattern::route("GET", "/_cluster/health"),
            resolver(|_| Err(MockError::Timeout("Request timed out".into()))),
        );

        let err = conn
            .request(RawRequest::new("GET", "/_cluster/health"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MockError::Timeout(msg) if msg == "Request timed out"));
    }

    #[tokio::test]
    async fn test_resolver_sees_params_and_normalized_body() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(
            &registry,
            Pattern::route("PUT", "/:index/_doc/:id"),
            resolver(|req| {
                Ok(json!({
                    "_index": req.params["index"],
                    "_id": req.params["id"],
                    "source": req.body,
                })
                .into())
            }),
        );

        let response = conn
            .request(RawRequest::new("PUT", "/test/_doc/42").with_body(r#"{"foo":"bar"}"#), None)
            .await
            .unwrap();
        assert_eq!(
            response.body_json().unwrap(),
            json!({ "_index": "test", "_id": "42", "source": { "foo": "bar" } })
        );
    }

    #[tokio::test]
    async fn test_streamed_gzip_bulk_matches_body() {
        let (registry, conn) = connection(GlobalSettings::default());
        let expected = json!([{ "index": { "_index": "test" } }, { "foo": "bar" }]);
        register(
            &registry,
            Pattern::api("bulk").body(expected),
            resolver(|_| Ok(json!({ "errors": false, "items": [] }).into())),
        );

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"{\"index\":{\"_index\":\"test\"}}\n{\"foo\":\"bar\"}\n")
            .unwrap();
        let compressed = encoder.finish().unwrap();
        let chunks: Vec<io::Result<Bytes>> = compressed
            .chunks(8)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let response = conn
            .request(
                RawRequest::new("POST", "/_bulk")
                    .with_header("Content-Type", "application/vnd.elasticsearch+x-ndjson; compatible-with=8")
                    .with_header("Content-Encoding", "gzip")
                    .with_body(RequestBody::stream(futures::stream::iter(chunks))),
                None,
            )
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_json().unwrap()["errors"], false);
    }

    #[tokio::test]
    async fn test_stream_error_fails_request() {
        let (registry, conn) = connection(GlobalSettings::default());
        register(&registry, Pattern::route("POST", "/_search"), resolver(|_| Ok(json!({}).into())));

        let chunks = vec![Err(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"))];
        let err = conn
            .request(
                RawRequest::new("POST", "/_search").with_body(RequestBody::stream(futures::stream::iter(chunks))),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_abort_before_start_never_runs_resolver() {
        let (registry, conn) = connection(GlobalSettings::default());
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        register(
            &registry,
            Pattern::route("GET", "/a"),
            resolver(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(json!({}).into())
            }),
        );

        let token = CancellationToken::new();
        token.cancel();
        let err = conn
            .request(RawRequest::new("GET", "/a"), Some(token))
            .await
            .unwrap_err();

        assert!(err.is_aborted());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_abort_while_draining_body() {
        let (registry, conn) = connection(GlobalSettings::default());
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        register(
            &registry,
            Pattern::route("POST", "/_bulk"),
            resolver(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(json!({}).into())
            }),
        );

        let token = CancellationToken::new();
        let request = RawRequest::new("POST", "/_bulk")
            .with_body(RequestBody::stream(futures::stream::pending::<io::Result<Bytes>>()));

        let task = {
            let conn = conn.clone();
            let token = token.clone();
            tokio::spawn(async move { conn.request(request, Some(token)).await })
        };
        tokio::task::yield_now().await;
        token.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(MockError::RequestAborted)));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_resolution_reads_current_registry_state() {
        let (registry, conn) = connection(GlobalSettings::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<Bytes>();
        let body = futures::stream::once(async move {
            rx.await.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        });

        let task = {
            let conn = conn.clone();
            tokio::spawn(async move {
                conn.request(
                    RawRequest::new("POST", "/late").with_body(RequestBody::stream(body)),
                    None,
                )
                .await
            })
        };
        tokio::task::yield_now().await;

        // registered after the request started but before normalization finished
        register(&registry, Pattern::route("POST", "/late"), resolver(|_| Ok("late".into())));
        tx.send(Bytes::from_static(b"{}")).unwrap();

        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_text(), "late");
    }
}
