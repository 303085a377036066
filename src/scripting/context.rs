//! Script execution context
//!
//! The data that crosses the sandbox boundary. The host serializes a
//! [`ScriptEnvironment`] into a JSON message, the sandbox answers with a
//! [`ScriptReply`], and the reply is folded back into the environment.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::ScriptError;
use crate::models::HeadersDict;

/// Request data available to scripts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HeadersDict,
    /// Raw body text, empty when the request has none
    #[serde(default)]
    pub body: String,
}

impl RequestSnapshot {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// Response data available to post-request scripts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: HeadersDict,
    /// Raw text body; the sandbox exposes it parsed as `data` when it is JSON
    #[serde(default)]
    pub body: String,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            ..Default::default()
        }
    }
}

/// One `test(...)` or `test.expect(...)` outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Assertion {
    pub fn passed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            error: None,
        }
    }

    pub fn failed(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// A line written through the script's `console`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLog {
    pub level: LogLevel,
    pub message: String,
}

/// Ephemeral per-execution state shared by the pre and post phases.
///
/// `variables` is scratch space for `environment.get/set`; it is never
/// written back to the [`crate::variables::VariableStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptEnvironment {
    pub variables: IndexMap<String, JsonValue>,
    pub request: RequestSnapshot,
    pub response: Option<ResponseSnapshot>,
    pub assertions: Vec<Assertion>,
    pub logs: Vec<ScriptLog>,
}

impl ScriptEnvironment {
    pub fn new(request: RequestSnapshot) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    /// Ephemeral variable as set by a script
    pub fn variable(&self, key: &str) -> Option<&JsonValue> {
        self.variables.get(key)
    }

    pub fn all_passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }

    /// Serialize the sandbox input message
    pub(crate) fn to_message(&self) -> Result<String, ScriptError> {
        let message = ScriptMessage {
            variables: &self.variables,
            request: &self.request,
            response: self.response.as_ref(),
        };
        serde_json::to_string(&message)
            .map_err(|e| ScriptError::Engine(format!("Failed to encode script input: {}", e)))
    }

    /// Fold a sandbox reply into this environment
    pub(crate) fn apply(mut self, reply: ScriptReply) -> Self {
        self.variables = reply.variables;
        self.request = reply.request;
        self.assertions.extend(reply.assertions);
        self.logs.extend(reply.logs);
        self
    }
}

#[derive(Serialize)]
struct ScriptMessage<'a> {
    variables: &'a IndexMap<String, JsonValue>,
    request: &'a RequestSnapshot,
    response: Option<&'a ResponseSnapshot>,
}

/// What the sandbox sends back after a successful run
#[derive(Debug, Deserialize)]
pub(crate) struct ScriptReply {
    #[serde(default)]
    pub variables: IndexMap<String, JsonValue>,
    pub request: RequestSnapshot,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub logs: Vec<ScriptLog>,
}

impl ScriptReply {
    pub(crate) fn parse(reply: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(reply)
            .map_err(|e| ScriptError::Engine(format!("Malformed script reply: {}", e)))
    }
}
