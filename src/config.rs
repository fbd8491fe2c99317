//! Configuration for file-declared mocks.
//!
//! Patterns can be declared in YAML next to the tests that use them, each
//! with a static (optionally templated) response or a simulated transport
//! failure.

use crate::error::{MockError, ResponseError};
use crate::normalize::NormalizedRequest;
use crate::pattern::{Pattern, Reply, Resolver};
use crate::template::TemplateEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    /// Pattern definitions, registered in order
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl MockConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, pattern) in self.patterns.iter().enumerate() {
            pattern
                .validate()
                .map_err(|e| anyhow::anyhow!("Pattern {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A pattern plus what to answer when it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    /// Optional name, used in log output only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub pattern: Pattern,

    /// Response to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseDefinition>,

    /// Transport failure to raise instead of responding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultConfig>,
}

impl PatternDefinition {
    /// Validate the definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pattern.expand()?;
        if self.response.is_none() && self.fault.is_none() {
            anyhow::bail!("The resolver function is not defined");
        }
        if let Some(response) = &self.response {
            response.validate()?;
        }
        Ok(())
    }

    /// Resolver answering with the fault, else with the response.
    ///
    /// `None` when neither is declared.
    pub fn resolver(&self, engine: &Arc<TemplateEngine>) -> Option<Resolver> {
        if let Some(fault) = &self.fault {
            let fault = fault.clone();
            return Some(Arc::new(move |_| Err(fault.to_error())));
        }

        let response = self.response.clone()?;
        let engine = Arc::clone(engine);
        Some(Arc::new(move |request| response.reply(&engine, request)))
    }
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: Option<ResponseBody>,

    /// Whether this is a template response
    #[serde(default)]
    pub template: bool,
}

fn default_status() -> u16 {
    200
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }

    /// Build the reply for a matched request.
    ///
    /// A plain 200 without extra headers is a JSON or text reply; anything
    /// else is delivered as a pre-built response carrying its own status.
    pub fn reply(&self, engine: &TemplateEngine, request: &NormalizedRequest) -> Result<Reply, MockError> {
        let body = match &self.body {
            None => Value::String(String::new()),
            Some(ResponseBody::Text { content }) if self.template => {
                Value::String(engine.render(content, request).map_err(render_error)?)
            }
            Some(ResponseBody::Text { content }) => Value::String(content.clone()),
            Some(ResponseBody::Json { content }) if self.template => {
                engine.render_json(content, request).map_err(render_error)?
            }
            Some(ResponseBody::Json { content }) => content.clone(),
        };

        if self.status == 200 && self.headers.is_empty() {
            return Ok(match body {
                Value::String(text) => Reply::Text(text),
                json => Reply::Json(json),
            });
        }

        let mut error = ResponseError::new(self.status, body);
        for (name, value) in &self.headers {
            error = error.with_header(name.as_str(), value.as_str());
        }
        Ok(Reply::Error(error))
    }
}

fn render_error(e: handlebars::RenderError) -> MockError {
    MockError::Serialization(format!("Failed to render response template: {}", e))
}

/// Response body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: Value },
}

/// Transport failure simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FaultConfig {
    /// Connection-level failure
    Connection {
        #[serde(default)]
        message: Option<String>,
    },
    /// Request timeout
    Timeout {
        #[serde(default)]
        message: Option<String>,
    },
    /// No node available
    NoLivingConnections {
        #[serde(default)]
        message: Option<String>,
    },
}

impl FaultConfig {
    pub fn to_error(&self) -> MockError {
        match self {
            FaultConfig::Connection { message } => MockError::connection(
                message.clone().unwrap_or_else(|| "Connection error".to_string()),
            ),
            FaultConfig::Timeout { message } => MockError::Timeout(
                message.clone().unwrap_or_else(|| "Request timed out".to_string()),
            ),
            FaultConfig::NoLivingConnections { message } => MockError::NoLivingConnections(
                message
                    .clone()
                    .unwrap_or_else(|| "There are no living connections".to_string()),
            ),
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every matched request
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Include the normalized request in not-found bodies
    #[serde(default)]
    pub echo_unmatched: bool,

    /// Value of the `x-elastic-product` response header, if any
    #[serde(default = "default_product_header")]
    pub product_header: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_product_header() -> Option<String> {
    Some("Elasticsearch".to_string())
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            echo_unmatched: false,
            product_header: default_product_header(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::OneOrMany;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_simple_pattern() {
        let yaml = r#"
patterns:
  - id: info
    method: GET
    path: /
    response:
      body:
        type: json
        content:
          version:
            number: "8.11.0"
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].id.as_deref(), Some("info"));
        assert_eq!(config.patterns[0].pattern.method, Some(OneOrMany::One("GET".into())));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_lists_api_and_constraints() {
        let yaml = r#"
patterns:
  - method: [GET, POST]
    path: [/_search, /:index/_search]
    querystring:
      size: "0"
    body:
      query:
        match_all: {}
    response:
      body:
        type: json
        content:
          hits: { total: { value: 0 }, hits: [] }
  - api: count
    response:
      body:
        type: json
        content: { count: 42 }
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        let first = &config.patterns[0].pattern;
        assert_eq!(first.expand().unwrap().len(), 4);
        assert_eq!(first.querystring.as_ref().unwrap()["size"], "0");
        assert_eq!(first.body, Some(json!({ "query": { "match_all": {} } })));
        assert_eq!(config.patterns[1].pattern.api.as_deref(), Some("count"));
    }

    #[test]
    fn test_parse_settings() {
        let yaml = r#"
settings:
  log_matches: false
  echo_unmatched: true
  product_header: null
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert!(config.settings.echo_unmatched);
        assert_eq!(config.settings.product_header, None);
    }

    #[test]
    fn test_unknown_settings_rejected() {
        assert!(MockConfig::from_yaml("settings:\n  bogus: 1\n").is_err());
    }

    #[test]
    fn test_validate_missing_resolver() {
        let yaml = r#"
patterns:
  - method: GET
    path: /a
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Pattern 0: The resolver function is not defined");
    }

    #[test]
    fn test_validate_missing_path() {
        let yaml = r#"
patterns:
  - method: GET
    response:
      status: 200
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Pattern 0: The path is not defined");
    }

    #[test]
    fn test_validate_status_range() {
        let yaml = r#"
patterns:
  - method: GET
    path: /a
    response:
      status: 700
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_fault_config() {
        let yaml = r#"
patterns:
  - method: GET
    path: /_cluster/health
    fault:
      type: timeout
"#;
        let config = MockConfig::from_yaml(yaml).unwrap();
        match config.patterns[0].fault.as_ref().unwrap().to_error() {
            MockError::Timeout(message) => assert_eq!(message, "Request timed out"),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_kinds() {
        let engine = TemplateEngine::new();
        let request = NormalizedRequest::new("GET", "/");

        let json_response = ResponseDefinition {
            status: 200,
            headers: BTreeMap::new(),
            body: Some(ResponseBody::Json {
                content: json!({ "acknowledged": true }),
            }),
            template: false,
        };
        assert_eq!(
            json_response.reply(&engine, &request).unwrap(),
            Reply::Json(json!({ "acknowledged": true }))
        );

        let text_response = ResponseDefinition {
            body: Some(ResponseBody::Text {
                content: "green".to_string(),
            }),
            ..json_response.clone()
        };
        assert_eq!(
            text_response.reply(&engine, &request).unwrap(),
            Reply::Text("green".to_string())
        );

        let created = ResponseDefinition {
            status: 201,
            ..json_response
        };
        match created.reply(&engine, &request).unwrap() {
            Reply::Error(error) => {
                assert_eq!(error.status_code, 201);
                assert_eq!(error.body, json!({ "acknowledged": true }));
            }
            other => panic!("Expected pre-built response, got {:?}", other),
        }
    }

    #[test]
    fn test_templated_reply() {
        let engine = TemplateEngine::new();
        let mut request = NormalizedRequest::new("GET", "/test/_doc/7");
        request.params.insert("index".to_string(), "test".to_string());
        request.params.insert("id".to_string(), "7".to_string());

        let response = ResponseDefinition {
            status: 200,
            headers: BTreeMap::new(),
            body: Some(ResponseBody::Json {
                content: json!({ "_index": "{{params.index}}", "_id": "{{params.id}}", "found": true }),
            }),
            template: true,
        };
        assert_eq!(
            response.reply(&engine, &request).unwrap(),
            Reply::Json(json!({ "_index": "test", "_id": "7", "found": true }))
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "patterns:\n  - api: ping\n    response:\n      status: 200\n"
        )
        .unwrap();

        let config = MockConfig::from_file(file.path()).unwrap();
        assert_eq!(config.patterns.len(), 1);
        tokio_test::assert_ok!(config.validate());
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "patterns:\n  - path: /a\n    response: {{}}\n").unwrap();

        tokio_test::assert_err!(MockConfig::from_file(file.path()));
    }
}
