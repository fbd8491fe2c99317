//! Mock patterns and resolver replies.
//!
//! A [`Pattern`] is what a test registers: one or more methods, one or more
//! path templates (or a named operation from the [`catalog`](crate::catalog)),
//! and optional exact `querystring` / `body` constraints. Registration expands
//! it into one [`MockPattern`] per (method, path) pair.

use crate::catalog;
use crate::error::{MockError, ResponseError};
use crate::normalize::NormalizedRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What a resolver produces for a matched request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with a JSON body
    Json(Value),
    /// 200 with a plain-text body
    Text(String),
    /// Error response delivered with its own status and body
    Error(ResponseError),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<ResponseError> for Reply {
    fn from(error: ResponseError) -> Self {
        Reply::Error(error)
    }
}

/// Callback producing the mocked outcome for a request.
///
/// Returning `Err` propagates the error to the client instead of producing a
/// response.
pub type Resolver = Arc<dyn Fn(&NormalizedRequest) -> Result<Reply, MockError> + Send + Sync>;

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany<String> {
    fn from(values: [&str; N]) -> Self {
        OneOrMany::Many(values.into_iter().map(String::from).collect())
    }
}

/// Registration input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<OneOrMany<String>>,

    /// Named operation; replaces `method` and `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub querystring: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single method and path.
    pub fn route(method: &str, path: &str) -> Self {
        Self::new().method(method).path(path)
    }

    /// Pattern for a named client operation, e.g. `search` or `bulk`.
    pub fn api(name: impl Into<String>) -> Self {
        Self {
            api: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: impl Into<OneOrMany<String>>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn path(mut self, path: impl Into<OneOrMany<String>>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn querystring<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.querystring = Some(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Expand into (method, path) pairs, methods outer and paths inner.
    ///
    /// Fails when no method or no path is defined, or when `api` names an
    /// unknown operation.
    pub fn expand(&self) -> Result<Vec<(String, String)>, MockError> {
        let (methods, paths): (Vec<String>, Vec<String>) = match &self.api {
            Some(name) => {
                let endpoint = catalog::lookup(name).ok_or_else(|| {
                    MockError::configuration(format!("The api '{}' does not exist", name))
                })?;
                (
                    endpoint.methods.iter().map(|m| m.to_string()).collect(),
                    endpoint.paths.iter().map(|p| p.to_string()).collect(),
                )
            }
            None => (
                self.method.clone().map(OneOrMany::into_vec).unwrap_or_default(),
                self.path.clone().map(OneOrMany::into_vec).unwrap_or_default(),
            ),
        };

        if methods.is_empty() || methods.iter().any(|m| m.is_empty()) {
            return Err(MockError::configuration("The method is not defined"));
        }
        if paths.is_empty() || paths.iter().any(|p| p.is_empty()) {
            return Err(MockError::configuration("The path is not defined"));
        }

        Ok(methods
            .iter()
            .flat_map(|m| {
                paths
                    .iter()
                    .map(move |p| (m.to_ascii_uppercase(), p.clone()))
            })
            .collect())
    }
}

/// One registered rule: a single method and path plus optional constraints.
#[derive(Clone)]
pub struct MockPattern {
    pub method: String,
    pub path: String,
    pub querystring: Option<BTreeMap<String, String>>,
    pub body: Option<Value>,
    resolver: Resolver,
}

impl MockPattern {
    pub fn new(method: String, path: String, pattern: &Pattern, resolver: Resolver) -> Self {
        Self {
            method,
            path,
            querystring: pattern.querystring.clone(),
            body: pattern.body.clone(),
            resolver,
        }
    }

    /// Number of declared constraint fields, method and path included.
    pub fn specificity(&self) -> usize {
        2 + usize::from(self.body.is_some()) + usize::from(self.querystring.is_some())
    }

    /// Whether the body and querystring constraints hold for a request.
    pub fn matches(&self, request: &NormalizedRequest) -> bool {
        if let Some(body) = &self.body {
            if request.body.as_ref() != Some(body) {
                return false;
            }
        }
        if let Some(querystring) = &self.querystring {
            if &request.query != querystring {
                return false;
            }
        }
        true
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

impl fmt::Debug for MockPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPattern")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("querystring", &self.querystring)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
