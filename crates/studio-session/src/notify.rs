//! User-facing notifications and session lifecycle events
//!
//! The client reports every settled call through a `NotificationSink`: a
//! success message for mutating calls, an error message for failures. Session
//! lifecycle changes go out separately on a broadcast channel so any number of
//! listeners (a UI router, a logger) can react to them.

use tracing::{info, warn};

/// Destination for user-facing messages.
pub trait NotificationSink: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn success(&self, message: &str) {
        info!(notification = "success", message, "notify");
    }

    fn error(&self, message: &str) {
        warn!(notification = "error", message, "notify");
    }
}

/// Session lifecycle changes broadcast by `SessionClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Refresh was rejected; credentials cleared, sign-in required
    Invalidated,
    /// Explicit logout; credentials cleared
    LoggedOut,
    /// Login stored a fresh token pair
    SignedIn,
}
