//! Search Client Mock
//!
//! A mock transport for search-engine HTTP clients. Tests register request
//! patterns with resolver functions, then hand the mock's connection to the
//! client in place of its network transport. Requests are answered from the
//! registry without any I/O.
//!
//! # Features
//!
//! - **Pattern Registry**: Match by method, path template, query string and body
//! - **Path Templates**: `:param` and `*` segments, static segments win
//! - **Specificity**: Body and query constraints outrank bare routes
//! - **Request Normalization**: Streamed, gzipped and ndjson bodies
//! - **Cancellation**: Aborted requests fail with `RequestAborted`
//! - **File-Declared Mocks**: YAML patterns with Handlebars templated responses
//!
//! # Example
//!
//! ```no_run
//! use search_client_mock::{Mock, Pattern, RawRequest, Transport};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), search_client_mock::MockError> {
//! let mock = Mock::new();
//! mock.add(Pattern::route("GET", "/:index/_count"), |req| {
//!     Ok(json!({ "count": 42, "index": req.params["index"] }).into())
//! })?;
//!
//! let connection = mock.get_connection();
//! let response = connection
//!     .request(RawRequest::new("GET", "/books/_count"), None)
//!     .await?;
//! assert_eq!(response.status_code, 200);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```yaml
//! patterns:
//!   - id: doc
//!     api: get
//!     response:
//!       template: true
//!       body:
//!         type: json
//!         content:
//!           _index: "{{params.index}}"
//!           _id: "{{params.id}}"
//!           found: true
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod error;
pub mod mock;
pub mod normalize;
pub mod pattern;
pub mod registry;
pub mod router;
pub mod template;

pub use config::{GlobalSettings, MockConfig};
pub use connection::{MockConnection, Transport, TransportResponse};
pub use error::{MockError, ResponseError};
pub use mock::Mock;
pub use normalize::{NormalizedRequest, RawRequest, RequestBody};
pub use pattern::{Pattern, Reply, Resolver};
