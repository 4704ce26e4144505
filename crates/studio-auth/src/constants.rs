//! Studio API endpoint constants
//!
//! Paths are relative to the configured base URL. The credential-issuing set
//! is exempt from bearer attachment and never triggers a refresh.

use std::time::Duration;

/// Exchange a refresh token for a new access/refresh pair
pub const REFRESH_PATH: &str = "/refresh";

/// Revoke a refresh token server-side
pub const LOGOUT_PATH: &str = "/logout";

/// Email/password sign-in
pub const LOGIN_PATH: &str = "/login";

/// Endpoints that establish, rotate or revoke credentials.
///
/// Each entry matches the path itself and anything below it, so `/signup`
/// covers every step of the registration wizard (`/signup/verify`, ...).
pub const CREDENTIAL_ENDPOINTS: &[&str] = &[
    LOGIN_PATH,
    "/signup",
    "/forgot-password",
    "/reset-password",
    REFRESH_PATH,
    LOGOUT_PATH,
];

/// Per-call timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether `path` targets a credential-issuing endpoint.
///
/// Query strings and trailing slashes are ignored.
pub fn is_credential_endpoint(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    CREDENTIAL_ENDPOINTS.iter().any(|endpoint| {
        path == *endpoint
            || path
                .strip_prefix(*endpoint)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Join the base URL and an endpoint path without doubling slashes.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
