//! Outbound call descriptor

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use studio_auth::is_credential_endpoint;

use crate::error::{Error, Result};
use crate::pipeline::bearer_value;

/// One call to the Studio API, relative to the client's base URL.
///
/// `path` may include a query string. The retry marker is private: only the
/// session client sets it, and it is set before a refresh is awaited so a
/// replayed call can never trigger a second refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    long_running: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            long_running: false,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize and attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::InvalidRequest(format!("serializing request body: {e}")))?;
        Ok(self.body(value))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send an explicit bearer credential. The request pipeline leaves
    /// caller-set credentials alone.
    pub fn bearer(self, token: &str) -> Result<Self> {
        let value = bearer_value(token)
            .ok_or_else(|| Error::InvalidRequest("bearer token is not a valid header".into()))?;
        Ok(self.header(AUTHORIZATION, value))
    }

    /// Mark the call as long-running (image generation). Only changes the
    /// wording of a timeout failure.
    pub fn long_running(mut self) -> Self {
        self.long_running = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn json_body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn is_long_running(&self) -> bool {
        self.long_running
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn is_credential_endpoint(&self) -> bool {
        is_credential_endpoint(&self.path)
    }

    /// Whether a 401 on this call may be recovered by a refresh.
    pub fn is_refreshable(&self) -> bool {
        !self.retried && !self.is_credential_endpoint()
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}
