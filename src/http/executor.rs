//! Single-request execution
//!
//! Runs the pre-request script, interpolates the request, validates it,
//! sends it and runs the post-request script against the captured response.
//! Nothing in here returns an error to the caller: every failure ends up in
//! the returned [`RequestResult`].

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::HttpMethod;
use crate::errors::{ReqdeckError, Result};
use crate::interpolate::{interpolate, unresolved_placeholders};
use crate::models::{HeadersDict, Request};
use crate::results::{Notification, RequestResult, ResponseInfo, ResultStatus};
use crate::scripting::{
    RequestSnapshot, ResponseSnapshot, ScriptEnvironment, ScriptLimits, ScriptSandbox,
};
use crate::variables::Variable;

/// Content type assumed when none was authored
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Per-request timeout for the network call
    pub timeout: Duration,
    pub script_limits: ScriptLimits,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            script_limits: ScriptLimits::default(),
        }
    }
}

/// Executes one request at a time; cheap to clone and share across tasks
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    sandbox: ScriptSandbox,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new() -> Result<Self> {
        Self::with_options(ExecutorOptions::default())
    }

    pub fn with_options(options: ExecutorOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reqdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ReqdeckError::Request)?;

        Ok(Self {
            client,
            sandbox: ScriptSandbox::new(options.script_limits),
            timeout: options.timeout,
        })
    }

    pub fn sandbox(&self) -> &ScriptSandbox {
        &self.sandbox
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `request` with `variables` as the interpolation snapshot.
    ///
    /// Any received HTTP response, 4xx and 5xx included, yields a completed
    /// result. Validation and network failures yield a failed one.
    pub async fn execute(&self, request: &Request, variables: &[Variable]) -> RequestResult {
        let mut result = RequestResult::running(request);

        let seed = RequestSnapshot {
            method: request.method.to_string(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body_text(),
        };
        let pre_script = request.pre_request_script.as_deref().unwrap_or_default();
        let environment = match self.sandbox.run_pre_request(pre_script, seed.clone()).await {
            Ok(environment) => environment,
            Err(e) => {
                warn!(request = %request.label(), error = %e, "Pre-request script failed");
                result
                    .notifications
                    .push(Notification::error(format!("Pre-request script failed: {}", e)));
                ScriptEnvironment::new(seed)
            }
        };

        let method = match environment.request.method.parse::<HttpMethod>() {
            Ok(method) => method,
            Err(_) => {
                result.notifications.push(Notification::warning(format!(
                    "Ignoring method '{}' set by pre-request script",
                    environment.request.method
                )));
                request.method
            }
        };

        let url = interpolate(&environment.request.url, variables);
        let body = interpolate(&environment.request.body, variables);
        let headers: HeadersDict = environment
            .request
            .headers
            .iter()
            .map(|(key, value)| (key.clone(), interpolate(value, variables)))
            .collect();

        result.method = method;
        result.url = url.clone();
        result.assertions = environment.assertions.clone();
        result.logs = environment.logs.clone();

        let send_body = method.carries_body() && !body.trim().is_empty();
        let content_type = content_type_of(&headers);
        let checked = validate(
            &url,
            &headers,
            send_body.then_some(body.as_str()),
            content_type,
            variables,
        );
        if let Err(e) = checked {
            debug!(request = %request.label(), error = %e, "Request not sent");
            return fail(result, e.to_string());
        }

        let mut builder = self
            .client
            .request(method.to_reqwest(), url.as_str())
            .timeout(self.timeout);
        for (key, value) in &headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if send_body {
            if content_type.is_none() {
                builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
            }
            builder = builder.body(body);
        }

        debug!(%method, %url, "Sending request");
        let started = Instant::now();
        let outcome = match builder.send().await {
            Ok(response) => {
                let status = response.status();
                let response_headers = collect_headers(response.headers());
                response.text().await.map(|text| (status, response_headers, text))
            }
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        result.duration_ms = Some(duration_ms);

        let (status, response_headers, text) = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                let error = self.describe_error(&e);
                warn!(%method, %url, error = %error, "Request failed");
                return fail(result, error.to_string());
            }
        };

        let info = ResponseInfo {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            data: text,
            headers: response_headers,
        };
        debug!(%method, %url, status = info.status, duration_ms, "Request completed");

        let post_script = request.post_request_script.as_deref().unwrap_or_default();
        let snapshot = ResponseSnapshot {
            status: info.status,
            status_text: info.status_text.clone(),
            headers: info.headers.clone(),
            body: info.data.clone(),
        };
        match self
            .sandbox
            .run_post_request(post_script, snapshot, environment)
            .await
        {
            Ok(environment) => {
                result.assertions = environment.assertions;
                result.logs = environment.logs;
            }
            Err(e) => {
                warn!(request = %request.label(), error = %e, "Post-request script failed");
                result
                    .notifications
                    .push(Notification::error(format!("Post-request script failed: {}", e)));
            }
        }

        result.status = ResultStatus::Completed;
        result.response = Some(info);
        result
    }

    fn describe_error(&self, e: &reqwest::Error) -> ReqdeckError {
        let message = if e.is_timeout() {
            format!("Request timed out after {:?}", self.timeout)
        } else if e.is_connect() {
            format!("Connection failed: {}", e)
        } else if e.is_body() || e.is_decode() {
            format!("Failed to read response body: {}", e)
        } else {
            e.to_string()
        };
        ReqdeckError::Network(message)
    }
}

fn fail(mut result: RequestResult, error: String) -> RequestResult {
    result.status = ResultStatus::Failed;
    result.error = Some(error);
    result
}

/// Authored `Content-Type`, matched case-insensitively
fn content_type_of(headers: &HeadersDict) -> Option<&str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
        .map(|(_, value)| value.as_str())
}

/// `application/json` and `+json` suffixed types
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == JSON_CONTENT_TYPE || essence.ends_with("+json")
}

/// Checks that must pass before anything goes on the wire
fn validate(
    url: &str,
    headers: &HeadersDict,
    body: Option<&str>,
    content_type: Option<&str>,
    variables: &[Variable],
) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| {
        let missing = unresolved_placeholders(url, variables);
        let message = if missing.is_empty() {
            format!("Invalid URL '{}': {}", url, e)
        } else {
            format!(
                "Invalid URL '{}': {} (unresolved variables: {})",
                url,
                e,
                missing.join(", ")
            )
        };
        ReqdeckError::Validation(message)
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ReqdeckError::Validation(format!(
            "Unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }

    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ReqdeckError::Validation(format!("Invalid header name '{}'", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            ReqdeckError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }

    if let Some(body) = body {
        if is_json_content_type(content_type.unwrap_or(JSON_CONTENT_TYPE)) {
            serde_json::from_str::<JsonValue>(body)
                .map_err(|e| ReqdeckError::Validation(format!("Invalid JSON body: {}", e)))?;
        }
    }
    Ok(())
}

fn collect_headers(headers: &HeaderMap) -> HeadersDict {
    let mut collected = HeadersDict::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}
