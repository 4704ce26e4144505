//! Session-aware API client
//!
//! Every call goes through the same path:
//! 1. Request pipeline attaches the stored access token
//! 2. Response pipeline classifies the outcome
//! 3. `AuthExpired` hands the call to the refresh coordinator, which replays
//!    it at most once with the rotated token
//! 4. The settled outcome is reported to the notification sink and metrics

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use studio_auth::{
    CredentialStore, DEFAULT_TIMEOUT, Envelope, LOGIN_PATH, TokenPair, endpoint_url,
    refresh_session, revoke_session,
};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, instrument, warn};

use crate::classify::{
    SESSION_EXPIRED_MESSAGE, classify_response, classify_transport, success_message,
};
use crate::error::{Error, ErrorKind, Result};
use crate::metrics;
use crate::notify::{NotificationSink, SessionEvent};
use crate::pipeline::{attach_credentials, replay_credentials};
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::request::ApiRequest;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const EVENT_CAPACITY: usize = 16;

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Per-client settings shared by every call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root; paths are appended to it
    pub base_url: String,
    /// Fixed timeout for every outbound call, refresh and logout included
    pub timeout: Duration,
    /// Default `Content-Type` header
    pub content_type: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            content_type: "application/json".into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// HTTP client bound to one user session.
///
/// Owns the session's refresh coordinator, so at most one refresh exchange is
/// in flight per client no matter how many calls fail with an expired token.
pub struct SessionClient {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
    /// Bumped by login and logout. A refresh only writes its tokens back if
    /// the epoch it started under is still current; the lock is held across
    /// that write so logout cannot interleave.
    epoch: Mutex<u64>,
    notifier: Arc<dyn NotificationSink>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let content_type = HeaderValue::from_str(&config.content_type).map_err(|e| {
            Error::InvalidRequest(format!("content type {:?}: {e}", config.content_type))
        })?;
        let mut defaults = HeaderMap::new();
        defaults.insert(CONTENT_TYPE, content_type);
        defaults.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(defaults)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::InvalidRequest(format!("building HTTP client: {e}")))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            http,
            config,
            store,
            coordinator: RefreshCoordinator::new(),
            epoch: Mutex::new(0),
            notifier,
            events,
        })
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a call and return the decoded envelope.
    pub async fn send(&self, request: ApiRequest) -> Result<Envelope<Value>> {
        self.execute(request, new_request_id(), Ok).await
    }

    /// Issue a call and decode its `data` payload. A payload that does not
    /// decode settles the call as `InvalidResponse`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.execute(request, new_request_id(), |envelope| {
            envelope
                .data_as()
                .map_err(|e| Error::InvalidResponse(format!("decoding response data: {e}")))
        })
        .await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_as(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_as(ApiRequest::post(path).json(body)?).await
    }

    /// Exchange email and password for a fresh token pair.
    pub async fn login(&self, email: &str, password: &Secret<String>) -> Result<()> {
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginBody {
            email,
            password: password.expose_str(),
        })?;
        let tokens: TokenPair = self.send_as(request).await?;
        {
            let mut epoch = self.epoch.lock().await;
            *epoch += 1;
            if let Err(e) = self.store.set(tokens).await {
                warn!(error = %e, "failed to persist session after login");
            }
        }
        info!("signed in");
        let _ = self.events.send(SessionEvent::SignedIn);
        Ok(())
    }

    /// End the session. Local credentials are gone before the server is told;
    /// a failed server-side revoke is only logged.
    ///
    /// A refresh still in flight when this runs is discarded: its tokens are
    /// never stored and the calls waiting on it fail.
    pub async fn logout(&self) {
        let refresh = {
            let mut epoch = self.epoch.lock().await;
            *epoch += 1;
            let refresh = self.store.get().await.refresh;
            if let Err(e) = self.store.clear().await {
                warn!(error = %e, "failed to persist cleared session");
            }
            refresh
        };
        info!("logged out");
        let _ = self.events.send(SessionEvent::LoggedOut);

        if let Some(refresh) = refresh {
            self.revoke(&refresh).await;
        }
    }

    /// Whether the store holds any credential.
    pub async fn is_signed_in(&self) -> bool {
        !self.store.get().await.is_empty()
    }

    /// Best-effort server-side revoke of a refresh token.
    async fn revoke(&self, refresh: &Secret<String>) {
        if let Err(e) = revoke_session(
            &self.http,
            &self.config.base_url,
            refresh.expose_str(),
            self.config.timeout,
        )
        .await
        {
            warn!(error = %e, "server-side logout failed, local session already cleared");
        }
    }

    /// Dispatch, recover from an expired token, decode, then report the
    /// settled outcome exactly once.
    #[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.path()))]
    async fn execute<T, F>(&self, mut request: ApiRequest, request_id: String, decode: F) -> Result<T>
    where
        F: FnOnce(Envelope<Value>) -> Result<T>,
    {
        let first = self.dispatch(&request, &request_id, None).await;
        let result = match first {
            Err(err) if err.kind() == ErrorKind::AuthExpired => {
                self.recover(&mut request, &request_id, err).await
            }
            other => other,
        };

        let settled = result.and_then(|envelope| {
            let message = success_message(request.method(), &envelope).map(str::to_owned);
            decode(envelope).map(|value| (value, message))
        });
        self.report(
            &request,
            settled.as_ref().map(|(_, message)| message.as_deref()),
        );
        settled.map(|(value, _)| value)
    }

    /// Wait on (or drive) a refresh, then replay once with the new token.
    async fn recover(
        &self,
        request: &mut ApiRequest,
        request_id: &str,
        original: Error,
    ) -> Result<Envelope<Value>> {
        request.mark_retried();
        debug!("access token rejected, waiting on refresh");
        match self.coordinator.run(|| self.exchange()).await {
            RefreshOutcome::Refreshed(access) => {
                debug!("replaying with refreshed credentials");
                self.dispatch(request, request_id, Some(&access)).await
            }
            RefreshOutcome::NoRefreshToken | RefreshOutcome::Rejected(_) => Err(original),
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        request_id: &str,
        replay: Option<&Secret<String>>,
    ) -> Result<Envelope<Value>> {
        let mut headers = request.headers().clone();
        let attachment = match replay {
            Some(access) => replay_credentials(&mut headers, access),
            None => {
                let credentials = self.store.get().await;
                attach_credentials(request.path(), &mut headers, credentials.access.as_ref())
            }
        };
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        debug!(
            credentials = attachment.label(),
            retried = request.is_retried(),
            "dispatching"
        );

        let mut builder = self
            .http
            .request(
                request.method().clone(),
                endpoint_url(&self.config.base_url, request.path()),
            )
            .headers(headers);
        if let Some(body) = request.json_body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            classify_transport(&e, request.is_long_running(), self.config.timeout)
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            classify_transport(&e, request.is_long_running(), self.config.timeout)
        })?;
        debug!(status, "response received");

        classify_response(status, &body, request.is_refreshable())
    }

    /// Run one refresh exchange. Only the coordinator's leader gets here, so
    /// each failure is notified exactly once.
    async fn exchange(&self) -> RefreshOutcome {
        let (started, refresh) = {
            let epoch = self.epoch.lock().await;
            (*epoch, self.store.get().await.refresh)
        };
        let Some(refresh) = refresh else {
            warn!("access token expired and no refresh token is stored");
            metrics::record_refresh(RefreshOutcome::NoRefreshToken.label());
            self.notifier.error(SESSION_EXPIRED_MESSAGE);
            return RefreshOutcome::NoRefreshToken;
        };

        match refresh_session(
            &self.http,
            &self.config.base_url,
            refresh.expose_str(),
            self.config.timeout,
        )
        .await
        {
            Ok(tokens) => {
                let access = tokens.access_token.clone();
                {
                    let epoch = self.epoch.lock().await;
                    if *epoch != started {
                        drop(epoch);
                        return self.discard(tokens).await;
                    }
                    if let Err(e) = self.store.set(tokens).await {
                        warn!(error = %e, "failed to persist refreshed session");
                    }
                }
                info!("session refreshed");
                let outcome = RefreshOutcome::Refreshed(access);
                metrics::record_refresh(outcome.label());
                outcome
            }
            Err(e) => {
                let outcome = RefreshOutcome::Rejected(e.to_string());
                {
                    let epoch = self.epoch.lock().await;
                    if *epoch != started {
                        // Signed out or in again meanwhile; that session is not ours to clear
                        info!(error = %e, "refresh failed after session changed");
                        metrics::record_refresh(outcome.label());
                        return outcome;
                    }
                    warn!(error = %e, "refresh rejected, clearing session");
                    if let Err(e) = self.store.clear().await {
                        warn!(error = %e, "failed to persist cleared session");
                    }
                }
                metrics::record_refresh(outcome.label());
                self.notifier.error(SESSION_EXPIRED_MESSAGE);
                let _ = self.events.send(SessionEvent::Invalidated);
                outcome
            }
        }
    }

    /// Drop tokens from an exchange that outlived its session. The caller
    /// already signed out (or in again), so nothing is notified.
    async fn discard(&self, tokens: TokenPair) -> RefreshOutcome {
        info!("session changed during refresh, discarding rotated tokens");
        self.revoke(&tokens.refresh_token).await;
        let outcome = RefreshOutcome::Rejected("session changed during refresh".into());
        metrics::record_refresh(outcome.label());
        outcome
    }

    fn report(&self, request: &ApiRequest, result: std::result::Result<Option<&str>, &Error>) {
        let method = request.method().as_str();
        match result {
            Ok(success) => {
                if let Some(message) = success {
                    self.notifier.success(message);
                }
                debug!("call succeeded");
                metrics::record_call("ok", method);
            }
            Err(err) => {
                let kind = err.kind();
                // A failed refresh was already notified by the exchange
                if kind != ErrorKind::AuthExpired {
                    self.notifier.error(err.user_message());
                }
                warn!(kind = kind.label(), status = ?err.status(), error = %err, "call failed");
                metrics::record_call(kind.label(), method);
            }
        }
    }
}
