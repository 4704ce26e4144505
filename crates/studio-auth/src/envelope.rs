//! Response envelope shared by every Studio API endpoint
//!
//! `{ success, data, error, message, timestamp }`. Every field is optional on
//! the wire; a missing field takes its default so a sparse error body still
//! yields the server's message.

use common::Secret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl<T> Envelope<T> {
    /// Server-supplied message, if present and non-blank.
    pub fn server_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

impl Envelope<serde_json::Value> {
    /// Parse a raw response body. Returns `None` for bodies that are not an
    /// envelope-shaped JSON object (HTML error pages, plain text, empty).
    pub fn parse(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Envelope for a successful response that carried no body (204).
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: false,
            message: None,
            timestamp: None,
        }
    }

    /// Decode `data` into a concrete type. A missing `data` decodes as JSON
    /// `null`, so `Option<_>` and `()` targets accept it.
    pub fn data_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.data.as_ref().unwrap_or(&serde_json::Value::Null))
    }
}

/// Access/refresh pair returned by `/login` and `/refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access.into()),
            refresh_token: Secret::new(refresh.into()),
        }
    }
}

/// Body of the refresh and logout calls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody<'a> {
    pub refresh_token: &'a str,
}
