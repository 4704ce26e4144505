//! Error taxonomy for session client calls
//!
//! Every failure a caller can observe is one of these variants. Only
//! `AuthExpired` triggers recovery; all others are terminal for the call that
//! produced them. The type is `Clone` so a single rejection can be handed to
//! every caller queued behind a refresh.

use crate::classify::{
    GENERATION_TIMEOUT_MESSAGE, NETWORK_MESSAGE, TIMEOUT_MESSAGE, UNEXPECTED_RESPONSE_MESSAGE,
};

/// Coarse classification used for metrics labels and caller branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    Timeout,
    AuthExpired,
    AuthEndpointFailure,
    ClientFailure,
    ServerFailure,
    InvalidRequest,
    InvalidResponse,
}

impl ErrorKind {
    /// Label for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::AuthEndpointFailure => "auth_endpoint_failure",
            ErrorKind::ClientFailure => "client_failure",
            ErrorKind::ServerFailure => "server_failure",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidResponse => "invalid_response",
        }
    }
}

/// Errors returned by `SessionClient` calls.
///
/// Status-bearing variants carry the already-resolved user-facing message:
/// the server's envelope message when it sent one, else the fallback for the
/// status code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("network failure: {detail}")]
    Network { detail: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { long_running: bool, timeout_ms: u64 },

    #[error("access token expired: {message}")]
    AuthExpired { message: String },

    #[error("authentication failed ({status}): {message}")]
    AuthEndpoint { status: u16, message: String },

    #[error("request failed ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::NetworkFailure,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::AuthExpired { .. } => ErrorKind::AuthExpired,
            Error::AuthEndpoint { .. } => ErrorKind::AuthEndpointFailure,
            Error::Client { .. } => ErrorKind::ClientFailure,
            Error::Server { .. } => ErrorKind::ServerFailure,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }

    /// HTTP status of the response that produced this error, if one arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::AuthExpired { .. } => Some(401),
            Error::AuthEndpoint { status, .. }
            | Error::Client { status, .. }
            | Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &str {
        match self {
            Error::Network { .. } => NETWORK_MESSAGE,
            Error::Timeout {
                long_running: true, ..
            } => GENERATION_TIMEOUT_MESSAGE,
            Error::Timeout { .. } => TIMEOUT_MESSAGE,
            Error::AuthExpired { message }
            | Error::AuthEndpoint { message, .. }
            | Error::Client { message, .. }
            | Error::Server { message, .. } => message.as_str(),
            Error::InvalidRequest(_) | Error::InvalidResponse(_) => UNEXPECTED_RESPONSE_MESSAGE,
        }
    }
}

/// Result alias for session client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_status_follow_variant() {
        let err = Error::Client {
            status: 409,
            message: "This resource already exists.".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ClientFailure);
        assert_eq!(err.status(), Some(409));

        let err = Error::AuthExpired {
            message: "jwt expired".into(),
        };
        assert_eq!(err.kind(), ErrorKind::AuthExpired);
        assert_eq!(err.status(), Some(401));

        let err = Error::Network {
            detail: "connection refused".into(),
        };
        assert_eq!(err.status(), None);
    }

    #[test]
    fn timeout_message_depends_on_long_running() {
        let generation = Error::Timeout {
            long_running: true,
            timeout_ms: 30_000,
        };
        let ordinary = Error::Timeout {
            long_running: false,
            timeout_ms: 30_000,
        };
        assert_eq!(generation.user_message(), GENERATION_TIMEOUT_MESSAGE);
        assert_eq!(ordinary.user_message(), TIMEOUT_MESSAGE);
        assert_eq!(generation.to_string(), "request timed out after 30000ms");
    }

    #[test]
    fn status_errors_surface_resolved_message() {
        let err = Error::Server {
            status: 500,
            message: "Render farm unavailable".into(),
        };
        assert_eq!(err.user_message(), "Render farm unavailable");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(ErrorKind::AuthEndpointFailure.label(), "auth_endpoint_failure");
        assert_eq!(ErrorKind::NetworkFailure.label(), "network_failure");
    }
}
