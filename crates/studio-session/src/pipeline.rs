//! Request pipeline: bearer attachment
//!
//! Runs before every dispatch. Attaches `Authorization: Bearer <access>`
//! unless the caller already set a credential or the path is a
//! credential-issuing endpoint. Never fails; a missing or malformed token
//! just leaves the call unauthenticated and the response pipeline deals with
//! the consequences.

use common::Secret;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use studio_auth::is_credential_endpoint;
use tracing::warn;

/// What the pipeline did with a call's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Store token attached as a bearer header
    Attached,
    /// Caller set `Authorization` explicitly; left untouched
    CallerProvided,
    /// Credential-issuing endpoint; sent without a bearer header
    CredentialEndpoint,
    /// Store holds no access token
    NoToken,
    /// Stored token is not a valid header value; skipped
    InvalidToken,
}

impl Attachment {
    pub fn label(&self) -> &'static str {
        match self {
            Attachment::Attached => "attached",
            Attachment::CallerProvided => "caller_provided",
            Attachment::CredentialEndpoint => "credential_endpoint",
            Attachment::NoToken => "no_token",
            Attachment::InvalidToken => "invalid_token",
        }
    }
}

/// Build a sensitive `Bearer` header value, or `None` if the token contains
/// bytes not allowed in a header.
pub fn bearer_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Attach the stored access token to an ordinary call.
pub fn attach_credentials(
    path: &str,
    headers: &mut HeaderMap,
    access: Option<&Secret<String>>,
) -> Attachment {
    if headers.contains_key(AUTHORIZATION) {
        return Attachment::CallerProvided;
    }
    if is_credential_endpoint(path) {
        return Attachment::CredentialEndpoint;
    }
    let Some(access) = access else {
        return Attachment::NoToken;
    };
    match bearer_value(access.expose_str()) {
        Some(value) => {
            headers.insert(AUTHORIZATION, value);
            Attachment::Attached
        }
        None => {
            warn!(path, "stored access token is not a valid header value, sending unauthenticated");
            Attachment::InvalidToken
        }
    }
}

/// Attach a freshly rotated access token to a replayed call, replacing
/// whatever credential the first attempt carried.
pub fn replay_credentials(headers: &mut HeaderMap, access: &Secret<String>) -> Attachment {
    headers.remove(AUTHORIZATION);
    match bearer_value(access.expose_str()) {
        Some(value) => {
            headers.insert(AUTHORIZATION, value);
            Attachment::Attached
        }
        None => {
            warn!("refreshed access token is not a valid header value, replaying unauthenticated");
            Attachment::InvalidToken
        }
    }
}
