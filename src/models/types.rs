//! Core data types for requests and collections
//!
//! # Why IndexMap?
//!
//! Authored headers use [`IndexMap`] so the order a user typed them in is the
//! order they are sent and serialized back to storage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::errors::{ReqdeckError, Result};
use crate::http::HttpMethod;
use crate::variables::Variable;

/// Identifier of a stored request or collection
pub type EntityId = i64;

/// Header name to value, in authored order
pub type HeadersDict = IndexMap<String, String>;

/// Authored request body: raw text or a structured JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Text(String),
    Json(JsonValue),
}

impl RequestBody {
    /// Body as the text that gets interpolated and sent.
    ///
    /// Structured bodies are rendered as 2-space indented JSON.
    pub fn to_text(&self) -> String {
        match self {
            RequestBody::Text(text) => text.clone(),
            RequestBody::Json(value) => serde_json::to_string_pretty(value).unwrap_or_default(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RequestBody::Text(text) => text.trim().is_empty(),
            RequestBody::Json(JsonValue::Null) => true,
            RequestBody::Json(_) => false,
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<JsonValue> for RequestBody {
    fn from(value: JsonValue) -> Self {
        RequestBody::Json(value)
    }
}

/// The unit of execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: HeadersDict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(default, alias = "pre_request_script", skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<String>,
    #[serde(default, alias = "post_request_script", skip_serializing_if = "Option::is_none")]
    pub post_request_script: Option<String>,
    #[serde(default, alias = "collection_id", skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<EntityId>,
}

impl Request {
    pub fn new(id: EntityId, method: HttpMethod, url: &str) -> Self {
        Self {
            id,
            name: String::new(),
            method,
            url: url.to_string(),
            headers: HeadersDict::new(),
            body: None,
            pre_request_script: None,
            post_request_script: None,
            collection_id: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_pre_request_script(mut self, script: &str) -> Self {
        self.pre_request_script = Some(script.to_string());
        self
    }

    pub fn with_post_request_script(mut self, script: &str) -> Self {
        self.post_request_script = Some(script.to_string());
        self
    }

    /// Body text, empty when no body was authored
    pub fn body_text(&self) -> String {
        self.body.as_ref().map(RequestBody::to_text).unwrap_or_default()
    }

    /// Display name, falling back to `METHOD url` for unnamed requests
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            format!("{} {}", self.method, self.url)
        } else {
            self.name.clone()
        }
    }
}

/// An ordered set of requests; insertion order is sequential execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl Collection {
    pub fn new(id: EntityId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            requests: Vec::new(),
        }
    }

    /// Append a request, moving it into this collection.
    ///
    /// A request belongs to at most one collection, so any previous
    /// `collection_id` is overwritten.
    pub fn push(&mut self, mut request: Request) {
        request.collection_id = Some(self.id);
        self.requests.push(request);
    }

    pub fn with_request(mut self, request: Request) -> Self {
        self.push(request);
        self
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// On-disk collection document: a collection plus the variables it runs with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFile {
    #[serde(flatten)]
    pub collection: Collection,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

/// Load a collection document (JSON, or YAML for `.yaml`/`.yml`)
pub fn load_collection_file(path: &Path) -> Result<CollectionFile> {
    let content = std::fs::read_to_string(path)?;
    let mut file: CollectionFile = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    if file.collection.requests.is_empty() {
        return Err(ReqdeckError::Validation(format!(
            "Collection '{}' has no requests",
            file.collection.name
        )));
    }

    let id = file.collection.id;
    for request in &mut file.collection.requests {
        request.collection_id = Some(id);
    }

    Ok(file)
}

/// Load a standalone variables document (a list of variables)
pub fn load_variables_file(path: &Path) -> Result<Vec<Variable>> {
    let content = std::fs::read_to_string(path)?;
    if is_yaml(path) {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
