//! Per-request execution results and their aggregation for a run

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::http::HttpMethod;
use crate::models::{EntityId, HeadersDict, Request};
use crate::scripting::{Assertion, ScriptLog};

/// Lifecycle of one result slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl ResultStatus {
    /// Completed or failed
    pub fn is_settled(&self) -> bool {
        matches!(self, ResultStatus::Completed | ResultStatus::Failed)
    }
}

/// Captured HTTP response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInfo {
    pub status: u16,
    pub status_text: String,
    /// Raw text body, verbatim
    pub data: String,
    pub headers: HeadersDict,
}

impl ResponseInfo {
    /// Body parsed as JSON, when it is JSON
    pub fn json(&self) -> Option<JsonValue> {
        serde_json::from_str(&self.data).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Warning,
    Error,
}

/// A user-visible message produced while executing a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Outcome of executing one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResult {
    /// Mirrors the request id
    pub id: EntityId,
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time of the network call, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "duration")]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub logs: Vec<ScriptLog>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl RequestResult {
    pub fn pending(request: &Request) -> Self {
        Self {
            id: request.id,
            name: request.label(),
            method: request.method,
            url: request.url.clone(),
            status: ResultStatus::Pending,
            response: None,
            error: None,
            duration_ms: None,
            assertions: Vec::new(),
            logs: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn running(request: &Request) -> Self {
        Self {
            status: ResultStatus::Running,
            ..Self::pending(request)
        }
    }

    pub fn failed(request: &Request, error: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            error: Some(error.into()),
            ..Self::pending(request)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResultStatus::Failed
    }

    pub fn failed_assertions(&self) -> usize {
        self.assertions.iter().filter(|a| !a.passed).count()
    }
}

/// Counts and results of a run at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
    /// Percentage in `0..=100`
    pub progress: f64,
    pub results: Vec<RequestResult>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn has_failed_assertions(&self) -> bool {
        self.assertions_failed > 0
    }
}

/// One result slot per request, in collection order.
///
/// Every `start` or `reset` bumps the generation; records tagged with an
/// older generation are rejected so a late response from an abandoned run
/// cannot overwrite a fresh slot.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    results: Vec<RequestResult>,
    generation: u64,
    progress: f64,
    current_index: Option<usize>,
}

impl ResultAggregator {
    pub fn new(requests: &[Request]) -> Self {
        Self {
            results: requests.iter().map(RequestResult::pending).collect(),
            generation: 0,
            progress: 0.0,
            current_index: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every slot back to pending, progress to 0, and a new generation
    pub fn reset(&mut self, requests: &[Request]) -> u64 {
        self.results = requests.iter().map(RequestResult::pending).collect();
        self.progress = 0.0;
        self.current_index = None;
        self.generation += 1;
        self.generation
    }

    pub fn mark_running(&mut self, index: usize, request: &Request) {
        if let Some(slot) = self.results.get_mut(index) {
            *slot = RequestResult::running(request);
            self.current_index = Some(index);
        }
    }

    /// Replace a slot with its final result; false when the record is stale
    pub fn record(&mut self, generation: u64, index: usize, result: RequestResult) -> bool {
        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                index,
                "Discarding result from a previous run"
            );
            return false;
        }
        match self.results.get_mut(index) {
            Some(slot) => {
                *slot = result;
                true
            }
            None => false,
        }
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 100.0);
    }

    /// Progress from the number of settled slots
    pub fn settled_progress(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let settled = self.results.iter().filter(|r| r.status.is_settled()).count();
        settled as f64 / self.results.len() as f64 * 100.0
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Slot most recently marked running
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn results(&self) -> &[RequestResult] {
        &self.results
    }

    pub fn get(&self, index: usize) -> Option<&RequestResult> {
        self.results.get(index)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> RunSummary {
        let count =
            |status: ResultStatus| self.results.iter().filter(|r| r.status == status).count();
        let assertions = self.results.iter().flat_map(|r| r.assertions.iter());
        let (passed, failed) = assertions.fold((0, 0), |(p, f), a| {
            if a.passed {
                (p + 1, f)
            } else {
                (p, f + 1)
            }
        });

        RunSummary {
            total: self.results.len(),
            pending: count(ResultStatus::Pending),
            running: count(ResultStatus::Running),
            completed: count(ResultStatus::Completed),
            failed: count(ResultStatus::Failed),
            assertions_passed: passed,
            assertions_failed: failed,
            progress: self.progress,
            results: self.results.clone(),
        }
    }
}
