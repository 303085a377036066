//! In-memory copy of the requests stored on the backend

use serde::Deserialize;

use crate::http::HttpMethod;
use crate::models::{EntityId, Request, RequestBody};

/// Partial update; `None` fields are left as they are
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPatch {
    pub name: Option<String>,
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub body: Option<RequestBody>,
    pub pre_request_script: Option<String>,
    pub post_request_script: Option<String>,
    #[serde(alias = "collection_id")]
    pub collection_id: Option<EntityId>,
}

impl RequestPatch {
    fn apply(self, request: &mut Request) {
        if let Some(name) = self.name {
            request.name = name;
        }
        if let Some(method) = self.method {
            request.method = method;
        }
        if let Some(url) = self.url {
            request.url = url;
        }
        if let Some(body) = self.body {
            request.body = Some(body);
        }
        if let Some(script) = self.pre_request_script {
            request.pre_request_script = Some(script);
        }
        if let Some(script) = self.post_request_script {
            request.post_request_script = Some(script);
        }
        if let Some(collection_id) = self.collection_id {
            request.collection_id = Some(collection_id);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SavedRequests {
    requests: Vec<Request>,
}

impl SavedRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything, e.g. after fetching from the backend
    pub fn set_all(&mut self, requests: Vec<Request>) {
        self.requests = requests.into_iter().map(normalize_body).collect();
    }

    pub fn add(&mut self, request: Request) {
        self.requests.push(normalize_body(request));
    }

    /// False when no request has `id`
    pub fn update(&mut self, id: EntityId, patch: RequestPatch) -> bool {
        match self.requests.iter_mut().find(|r| r.id == id) {
            Some(request) => {
                patch.apply(request);
                true
            }
            None => false,
        }
    }

    /// Insert or replace by id
    pub fn upsert(&mut self, request: Request) {
        let request = normalize_body(request);
        match self.requests.iter_mut().find(|r| r.id == request.id) {
            Some(existing) => *existing = request,
            None => self.requests.push(request),
        }
    }

    pub fn delete(&mut self, id: EntityId) -> Option<Request> {
        let position = self.requests.iter().position(|r| r.id == id)?;
        Some(self.requests.remove(position))
    }

    pub fn get(&self, id: EntityId) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn by_collection(&self, collection_id: EntityId) -> Vec<&Request> {
        self.requests
            .iter()
            .filter(|r| r.collection_id == Some(collection_id))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Object and array bodies are stored as 2-space indented JSON text
fn normalize_body(mut request: Request) -> Request {
    if let Some(RequestBody::Json(value)) = &request.body {
        if value.is_object() || value.is_array() {
            request.body = Some(RequestBody::Text(RequestBody::Json(value.clone()).to_text()));
        }
    }
    request
}
