//! Refresh and logout exchanges
//!
//! Both calls carry the refresh token in the JSON body and are sent on a bare
//! `reqwest::Client` request, never through the session client's request
//! pipeline, so they can never pick up the (possibly expired) access token.

use std::time::Duration;

use tracing::debug;

use crate::constants::{LOGOUT_PATH, REFRESH_PATH, endpoint_url};
use crate::envelope::{Envelope, RefreshTokenBody, TokenPair};
use crate::error::{Error, Result};

/// Exchange a refresh token for a new access/refresh pair.
///
/// Succeeds only on a 2xx response whose envelope reports `success` and
/// carries both tokens. 401/403 means the refresh token is revoked or
/// expired and maps to `InvalidCredentials`.
pub async fn refresh_session(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<TokenPair> {
    let response = client
        .post(endpoint_url(base_url, REFRESH_PATH))
        .json(&RefreshTokenBody {
            refresh_token: refresh,
        })
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading refresh response: {e}")))?;
    let envelope = Envelope::parse(&body);
    let message = envelope
        .as_ref()
        .and_then(|e| e.server_message())
        .unwrap_or("<no message>")
        .to_string();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(Error::InvalidCredentials(format!(
            "refresh token rejected ({status}): {message}"
        )));
    }
    if !status.is_success() {
        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {message}"
        )));
    }

    let envelope = envelope
        .ok_or_else(|| Error::TokenExchange("refresh response is not an envelope".into()))?;
    if !envelope.success {
        return Err(Error::TokenExchange(format!(
            "refresh rejected by server: {message}"
        )));
    }

    let tokens: TokenPair = envelope
        .data_as()
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;
    debug!("refresh exchange returned a new token pair");
    Ok(tokens)
}

/// Ask the server to revoke a refresh token.
///
/// Callers treat this as best-effort: the local session is already gone by
/// the time it runs.
pub async fn revoke_session(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<()> {
    let response = client
        .post(endpoint_url(base_url, LOGOUT_PATH))
        .json(&RefreshTokenBody {
            refresh_token: refresh,
        })
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "logout returned {status}: {body}"
        )));
    }
    Ok(())
}
