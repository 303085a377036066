//! Editable copy of a request and its dirty flag

use serde_json::Value as JsonValue;

use crate::http::HttpMethod;
use crate::models::{HeadersDict, Request, RequestBody};

/// The request being edited in a tab, plus the last saved version of it
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDraft {
    current: Request,
    saved: Option<Request>,
}

impl Default for RequestDraft {
    fn default() -> Self {
        Self::new(Request::new(0, HttpMethod::Get, ""))
    }
}

impl RequestDraft {
    /// A draft that was never saved
    pub fn new(request: Request) -> Self {
        Self {
            current: request,
            saved: None,
        }
    }

    /// A draft opened from a stored request
    pub fn from_saved(request: Request) -> Self {
        Self {
            saved: Some(request.clone()),
            current: request,
        }
    }

    pub fn request(&self) -> &Request {
        &self.current
    }

    pub fn saved(&self) -> Option<&Request> {
        self.saved.as_ref()
    }

    pub fn is_saved(&self) -> bool {
        self.saved.is_some()
    }

    pub fn set_name(&mut self, name: &str) {
        self.current.name = name.to_string();
    }

    pub fn set_method(&mut self, method: HttpMethod) {
        self.current.method = method;
    }

    pub fn set_url(&mut self, url: &str) {
        self.current.url = url.to_string();
    }

    pub fn set_body(&mut self, body: impl Into<RequestBody>) {
        self.current.body = Some(body.into());
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.current.headers.insert(key.to_string(), value.to_string());
    }

    pub fn remove_header(&mut self, key: &str) {
        self.current.headers.shift_remove(key);
    }

    pub fn set_pre_request_script(&mut self, script: &str) {
        self.current.pre_request_script = Some(script.to_string());
    }

    pub fn set_post_request_script(&mut self, script: &str) {
        self.current.post_request_script = Some(script.to_string());
    }

    /// Adopt `request` as both the saved snapshot and the working copy
    pub fn mark_saved(&mut self, request: Request) {
        self.current = request.clone();
        self.saved = Some(request);
    }

    /// Revert unsaved edits
    pub fn discard(&mut self) {
        if let Some(saved) = &self.saved {
            self.current = saved.clone();
        }
    }

    /// Differs from the last save.
    ///
    /// JSON bodies compare structurally, so reformatting alone is not a
    /// change. A never-saved draft is dirty once it differs from a blank one.
    pub fn is_dirty(&self) -> bool {
        let current = Fingerprint::of(&self.current);
        match &self.saved {
            Some(saved) => current != Fingerprint::of(saved),
            None => current != Fingerprint::of(&RequestDraft::default().current),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Fingerprint<'a> {
    name: &'a str,
    method: HttpMethod,
    url: &'a str,
    headers: &'a HeadersDict,
    body: NormalizedBody,
    pre_request_script: &'a str,
    post_request_script: &'a str,
}

impl<'a> Fingerprint<'a> {
    fn of(request: &'a Request) -> Self {
        Self {
            name: &request.name,
            method: request.method,
            url: &request.url,
            headers: &request.headers,
            body: NormalizedBody::of(request.body.as_ref()),
            pre_request_script: request.pre_request_script.as_deref().unwrap_or_default(),
            post_request_script: request.post_request_script.as_deref().unwrap_or_default(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum NormalizedBody {
    Json(JsonValue),
    Text(String),
}

impl NormalizedBody {
    fn of(body: Option<&RequestBody>) -> Self {
        match body {
            None => NormalizedBody::Text(String::new()),
            Some(RequestBody::Json(value)) => NormalizedBody::Json(value.clone()),
            Some(RequestBody::Text(text)) => match serde_json::from_str(text) {
                Ok(value) => NormalizedBody::Json(value),
                Err(_) => NormalizedBody::Text(text.clone()),
            },
        }
    }
}
