//! Session-aware client for the Studio API
//!
//! Wraps every outbound call with credential attachment, outcome
//! classification and transparent recovery from an expired access token.
//! Concurrent calls that hit an expired token share a single refresh
//! exchange; each is replayed at most once with the rotated token.
//!
//! Call lifecycle:
//! 1. `pipeline` attaches `Authorization: Bearer <access>` unless the caller
//!    set one or the endpoint issues credentials
//! 2. `classify` maps the response (or transport error) to data or an `Error`
//! 3. `Error::AuthExpired` enters the `RefreshCoordinator`: the first caller
//!    drives `/refresh`, later callers queue behind it
//! 4. On success every queued call is replayed with the new token; on failure
//!    credentials are cleared and `SessionEvent::Invalidated` is broadcast
//! 5. The settled outcome reaches the `NotificationSink` and metrics

pub mod classify;
pub mod client;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod refresh;
pub mod request;

pub use classify::{classify_response, classify_status, fallback_message};
pub use client::{ClientConfig, SessionClient};
pub use error::{Error, ErrorKind, Result};
pub use notify::{NotificationSink, SessionEvent, TracingSink};
pub use pipeline::Attachment;
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshState};
pub use request::ApiRequest;
