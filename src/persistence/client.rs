//! HTTP client for the storage backend
//!
//! Every call either returns the decoded payload or a
//! [`ReqdeckError::Persistence`]; callers keep their in-memory state
//! untouched on error.

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::errors::{ReqdeckError, Result};
use crate::http::HttpMethod;
use crate::models::{Collection, EntityId, Request};
use crate::runner::RunMode;
use crate::variables::Variable;

/// Default backend location
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api";

/// Remote run lifecycle as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl RemoteRunStatus {
    /// Still worth polling
    pub fn is_active(&self) -> bool {
        matches!(self, RemoteRunStatus::Pending | RemoteRunStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    #[serde(deserialize_with = "id_as_string")]
    pub run_id: String,
    pub status: RemoteRunStatus,
    #[serde(default)]
    pub results: Option<Vec<JsonValue>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunStatusReport {
    pub status: RemoteRunStatus,
    #[serde(default)]
    pub results: Vec<JsonValue>,
}

/// Parameters of a backend-side collection run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub execution_mode: RunMode,
    /// Milliseconds
    pub delay_between_requests: u64,
    pub environment: Option<String>,
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Deserialize)]
struct RemoteVariable {
    variable_key: String,
    value: String,
}

#[derive(Deserialize)]
struct CollectionsEnvelope {
    collections: Vec<Collection>,
}

#[derive(Deserialize)]
struct VariablesEnvelope {
    variables: Vec<RemoteVariable>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestReply {
    Wrapped { request: Request },
    Bare(Request),
}

impl RequestReply {
    fn into_request(self) -> Request {
        match self {
            RequestReply::Wrapped { request } | RequestReply::Bare(request) => request,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequestBody<'a> {
    name: &'a str,
    method: HttpMethod,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pre_request_script: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_request_script: Option<&'a str>,
    #[serde(rename = "collection_id", skip_serializing_if = "Option::is_none")]
    collection_id: Option<EntityId>,
}

#[derive(Serialize)]
struct UpdateRequestBody<'a> {
    name: &'a str,
    method: HttpMethod,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    pre_request_script: &'a str,
    post_request_script: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveScriptsBody<'a> {
    request_id: EntityId,
    pre_request_script: &'a str,
    post_request_script: &'a str,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    user_id: String,
}

impl ApiClient {
    pub fn new(base_url: &str, user_id: &str) -> Result<Self> {
        Self::with_timeout(base_url, user_id, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, user_id: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ReqdeckError::Request)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// `GET /collections?userId=`
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let envelope: CollectionsEnvelope = self
            .send(self.request(Method::GET, "/collections", true)?)
            .await?;
        Ok(envelope.collections)
    }

    /// `POST /collections?userId=`
    pub async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection> {
        let body = serde_json::json!({ "name": name, "description": description });
        self.send(self.request(Method::POST, "/collections", true)?.json(&body))
            .await
    }

    /// `POST /requests?userId=`
    pub async fn create_request(&self, request: &Request) -> Result<Request> {
        let body = CreateRequestBody {
            name: &request.name,
            method: request.method,
            url: &request.url,
            body: stored_body(request),
            pre_request_script: request.pre_request_script.as_deref(),
            post_request_script: request.post_request_script.as_deref(),
            collection_id: request.collection_id,
        };
        let reply: RequestReply = self
            .send(self.request(Method::POST, "/requests", true)?.json(&body))
            .await?;
        Ok(reply.into_request())
    }

    /// `PUT /requests/{id}`
    pub async fn update_request(&self, request: &Request) -> Result<Request> {
        let body = UpdateRequestBody {
            name: &request.name,
            method: request.method,
            url: &request.url,
            body: stored_body(request),
            pre_request_script: request.pre_request_script.as_deref().unwrap_or_default(),
            post_request_script: request.post_request_script.as_deref().unwrap_or_default(),
        };
        let path = format!("/requests/{}", request.id);
        let reply: RequestReply = self
            .send(self.request(Method::PUT, &path, false)?.json(&body))
            .await?;
        Ok(reply.into_request())
    }

    /// `POST /requests/scripts`
    pub async fn save_scripts(
        &self,
        request_id: EntityId,
        pre_request_script: &str,
        post_request_script: &str,
    ) -> Result<()> {
        let body = SaveScriptsBody {
            request_id,
            pre_request_script,
            post_request_script,
        };
        let _: JsonValue = self
            .send(self.request(Method::POST, "/requests/scripts", false)?.json(&body))
            .await?;
        Ok(())
    }

    /// `GET /variables?userId=`, as environment-scoped variables
    pub async fn list_variables(&self) -> Result<Vec<Variable>> {
        let envelope: VariablesEnvelope = self
            .send(self.request(Method::GET, "/variables", true)?)
            .await?;
        Ok(envelope
            .variables
            .into_iter()
            .map(|v| Variable::environment(&v.variable_key, &v.value))
            .collect())
    }

    /// `POST /collections/{id}/run`
    pub async fn start_run(&self, collection_id: EntityId, run: &RunRequest) -> Result<RunStarted> {
        let mut body = serde_json::to_value(run)?;
        if let Some(object) = body.as_object_mut() {
            object.insert("userId".to_string(), JsonValue::String(self.user_id.clone()));
        }
        let path = format!("/collections/{}/run", collection_id);
        self.send(self.request(Method::POST, &path, false)?.json(&body)).await
    }

    /// `GET /collections/{id}/runs/{runId}`
    pub async fn run_status(
        &self,
        collection_id: EntityId,
        run_id: &str,
    ) -> Result<RunStatusReport> {
        let path = format!("/collections/{}/runs/{}", collection_id, run_id);
        self.send(self.request(Method::GET, &path, false)?).await
    }

    /// Builder for `path` under the base URL, optionally tagged with `userId`
    fn request(&self, method: Method, path: &str, with_user: bool) -> Result<RequestBuilder> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ReqdeckError::Persistence(format!("Invalid backend URL: {}", e)))?;
        if with_user {
            url.query_pairs_mut().append_pair("userId", &self.user_id);
        }
        Ok(self
            .client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json"))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Backend unreachable");
            ReqdeckError::Persistence(format!("Backend unreachable: {}", e))
        })?;

        let status = response.status();
        let url = response.url().to_string();
        let text = response
            .text()
            .await
            .map_err(|e| {
                ReqdeckError::Persistence(format!("Failed to read backend response: {}", e))
            })?;

        if !status.is_success() {
            let message = serde_json::from_str::<JsonValue>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(JsonValue::as_str).map(String::from))
                .unwrap_or_else(|| "An error occurred".to_string());
            warn!(%url, status = status.as_u16(), %message, "Backend returned an error");
            return Err(ReqdeckError::Persistence(format!(
                "{} (HTTP {})",
                message,
                status.as_u16()
            )));
        }

        debug!(%url, status = status.as_u16(), "Backend call succeeded");
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(body)
            .map_err(|e| ReqdeckError::Persistence(format!("Unexpected backend response: {}", e)))
    }
}

/// Body as stored by the backend: text, or nothing when blank
fn stored_body(request: &Request) -> Option<String> {
    request
        .body
        .as_ref()
        .filter(|body| !body.is_blank())
        .map(|body| body.to_text())
}

fn id_as_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid run id: {}", other))),
    }
}
