//! Outcome classification for completed calls
//!
//! Turns a transport error or an HTTP status plus body into either a decoded
//! envelope or one `Error` variant with a user-presentable message. The
//! server's envelope `message` wins when present; otherwise the fallback
//! table keyed by status code supplies the wording.
//!
//! A 401 is `AuthExpired` only when the caller says the request is still
//! refreshable (not a credential-issuing endpoint, not already retried).
//! Otherwise it is a terminal `AuthEndpoint` failure.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use studio_auth::Envelope;

use crate::error::Error;

pub const NETWORK_MESSAGE: &str = "Network error. Please check your internet connection.";

pub const TIMEOUT_MESSAGE: &str = "The request timed out. Please try again.";

/// Timeout wording for long-running calls (image generation).
pub const GENERATION_TIMEOUT_MESSAGE: &str =
    "Image generation is taking longer than expected. Please try again in a moment.";

pub const UNEXPECTED_RESPONSE_MESSAGE: &str =
    "Something went wrong while talking to the server. Please try again.";

/// Success wording when a mutating call's envelope carried no message.
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Changes saved successfully.";

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Fallback user-facing message for a failed status code.
pub fn fallback_message(status: u16) -> &'static str {
    match status {
        400 => "Invalid request. Please check your input.",
        401 => SESSION_EXPIRED_MESSAGE,
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        409 => "This resource already exists.",
        413 => "The uploaded file is too large.",
        422 => "Some of the submitted data is invalid.",
        429 => "Too many requests. Please slow down and try again.",
        502..=504 => "The service is temporarily unavailable. Please try again later.",
        500..=599 => "Server error. Please try again later.",
        _ => "Request failed. Please try again.",
    }
}

/// Whether a successful call with this method warrants a success notification.
///
/// Reads stay silent so background data fetches don't spam the user.
pub fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

/// Classify a failed HTTP status.
pub fn classify_status(status: u16, server_message: Option<&str>, refreshable: bool) -> Error {
    let message = server_message
        .unwrap_or_else(|| fallback_message(status))
        .to_string();
    match status {
        401 if refreshable => Error::AuthExpired { message },
        401 => Error::AuthEndpoint { status, message },
        500..=599 => Error::Server { status, message },
        _ => Error::Client { status, message },
    }
}

/// Classify a completed response by status and raw body.
///
/// 2xx with an empty body is a success without data. 2xx with an envelope
/// reporting `success: false` is a client failure carrying the envelope
/// message. A non-empty 2xx body that is not an envelope is an invalid
/// response.
pub fn classify_response(
    status: u16,
    body: &[u8],
    refreshable: bool,
) -> Result<Envelope<Value>, Error> {
    let envelope = Envelope::parse(body);

    if !(200..300).contains(&status) {
        let server_message = envelope.as_ref().and_then(|e| e.server_message());
        return Err(classify_status(status, server_message, refreshable));
    }

    match envelope {
        Some(envelope) if envelope.success => Ok(envelope),
        Some(envelope) => Err(Error::Client {
            status,
            message: envelope
                .server_message()
                .unwrap_or_else(|| fallback_message(status))
                .to_string(),
        }),
        None if body.iter().all(u8::is_ascii_whitespace) => Ok(Envelope::empty()),
        None => Err(Error::InvalidResponse(format!(
            "{status} response body is not an API envelope"
        ))),
    }
}

/// Classify a call that never produced a response.
pub fn classify_transport(err: &reqwest::Error, long_running: bool, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            long_running,
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_builder() {
        Error::InvalidRequest(err.to_string())
    } else {
        Error::Network {
            detail: err.to_string(),
        }
    }
}

/// Success notification text for a settled call, or `None` for reads.
pub fn success_message<'a>(method: &Method, envelope: &'a Envelope<Value>) -> Option<&'a str> {
    if !is_mutating(method) {
        return None;
    }
    Some(envelope.server_message().unwrap_or(DEFAULT_SUCCESS_MESSAGE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fallback_table_known_statuses() {
        assert_eq!(
            fallback_message(400),
            "Invalid request. Please check your input."
        );
        assert_eq!(fallback_message(409), "This resource already exists.");
        assert_eq!(
            fallback_message(429),
            "Too many requests. Please slow down and try again."
        );
        assert_eq!(fallback_message(500), "Server error. Please try again later.");
    }

    #[test]
    fn fallback_table_gateway_errors_share_wording() {
        assert_eq!(fallback_message(502), fallback_message(503));
        assert_eq!(fallback_message(503), fallback_message(504));
        assert_ne!(fallback_message(502), fallback_message(500));
    }

    #[test]
    fn fallback_table_unknown_statuses() {
        assert_eq!(fallback_message(418), "Request failed. Please try again.");
        assert_eq!(fallback_message(599), "Server error. Please try again later.");
    }

    #[test]
    fn mutating_methods() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
    }

    #[test]
    fn status_401_refreshable_is_auth_expired() {
        let err = classify_status(401, Some("jwt expired"), true);
        assert_eq!(err.kind(), ErrorKind::AuthExpired);
        assert_eq!(err.user_message(), "jwt expired");
    }

    #[test]
    fn status_401_not_refreshable_is_terminal() {
        let err = classify_status(401, Some("Invalid email or password"), false);
        assert_eq!(err.kind(), ErrorKind::AuthEndpointFailure);
        assert_eq!(err.user_message(), "Invalid email or password");
    }

    #[test]
    fn status_prefers_server_message() {
        let err = classify_status(409, Some("A style with this name already exists"), true);
        assert_eq!(err.kind(), ErrorKind::ClientFailure);
        assert_eq!(err.user_message(), "A style with this name already exists");
    }

    #[test]
    fn status_without_message_uses_fallback() {
        let err = classify_status(503, None, true);
        assert_eq!(err.kind(), ErrorKind::ServerFailure);
        assert_eq!(err.user_message(), fallback_message(503));
    }

    #[test]
    fn status_403_is_client_failure_not_auth() {
        let err = classify_status(403, None, true);
        assert_eq!(err.kind(), ErrorKind::ClientFailure);
    }

    #[test]
    fn response_success_envelope() {
        let envelope =
            classify_response(200, br#"{"success":true,"data":{"id":3},"message":"ok"}"#, true)
                .unwrap();
        assert_eq!(envelope.data.unwrap()["id"], 3);
    }

    #[test]
    fn response_empty_2xx_is_success_without_data() {
        let envelope = classify_response(204, b"", true).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn response_2xx_non_success_envelope_is_client_failure() {
        let err = classify_response(
            200,
            br#"{"success":false,"error":true,"message":"Monthly generation quota reached"}"#,
            true,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientFailure);
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.user_message(), "Monthly generation quota reached");
    }

    #[test]
    fn response_2xx_garbage_is_invalid_response() {
        let err = classify_response(200, b"<html>ok</html>", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[test]
    fn response_error_status_with_html_body_uses_fallback() {
        let err = classify_response(502, b"<html>Bad Gateway</html>", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerFailure);
        assert_eq!(err.user_message(), fallback_message(502));
    }

    #[test]
    fn response_401_envelope_message_is_kept() {
        let err =
            classify_response(401, br#"{"success":false,"message":"Token expired"}"#, true)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthExpired);
        assert_eq!(err.user_message(), "Token expired");
    }

    #[test]
    fn success_message_only_for_mutations() {
        let envelope = Envelope::parse(br#"{"success":true,"message":"Style saved"}"#).unwrap();
        assert_eq!(success_message(&Method::GET, &envelope), None);
        assert_eq!(
            success_message(&Method::POST, &envelope),
            Some("Style saved")
        );
        assert_eq!(
            success_message(&Method::DELETE, &Envelope::empty()),
            Some(DEFAULT_SUCCESS_MESSAGE)
        );
    }
}
