//! Studio session probe
//!
//! Command-line client for the Studio API that:
//! 1. Loads API settings from TOML
//! 2. Keeps the session in a file-backed credential store
//! 3. Issues calls through `SessionClient`, refreshing expired tokens transparently
//! 4. Prints the response data as JSON on stdout; logs go to stderr

mod command;
mod config;
mod error;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::Secret;
use metrics_exporter_prometheus::PrometheusBuilder;
use studio_auth::FileCredentialStore;
use studio_session::{SessionClient, SessionEvent, TracingSink};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::{Action, Cli};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let cli = Cli::parse();
    let config_path = cli.config;
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        credentials_path = %config.session.credentials_path.display(),
        "configuration loaded"
    );

    let store = FileCredentialStore::load(config.session.credentials_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open credential store {}",
                config.session.credentials_path.display()
            )
        })?;
    let client = SessionClient::new(
        config.client_config(),
        Arc::new(store),
        Arc::new(TracingSink),
    )
    .context("failed to build session client")?;

    let events = tokio::spawn(log_events(client.subscribe()));
    let outcome = run(&client, cli.command.into(), config.session.password.as_ref()).await;

    // Dropping the client closes the event channel and ends the listener
    drop(client);
    let _ = events.await;

    debug!(metrics = %prometheus.render(), "session metrics");
    outcome
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Invalidated) => {
                warn!("session invalidated, run `studio-probe login <email>` to sign in again")
            }
            Ok(SessionEvent::LoggedOut) => info!("session ended"),
            Ok(SessionEvent::SignedIn) => info!("session started"),
            Err(RecvError::Lagged(missed)) => warn!(missed, "session events dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run(
    client: &SessionClient,
    action: Action,
    password: Option<&Secret<String>>,
) -> Result<()> {
    match action {
        Action::Call(request) => {
            let envelope = client.send(request).await?;
            let data = envelope.data.unwrap_or(serde_json::Value::Null);
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Action::Login { email } => {
            let password = password.ok_or(error::Error::MissingPassword)?;
            client.login(&email, password).await?;
            println!("signed in as {email}");
        }
        Action::Logout => {
            client.logout().await;
            println!("signed out");
        }
        Action::Status => {
            let state = if client.is_signed_in().await {
                "signed in"
            } else {
                "signed out"
            };
            println!("{state}");
        }
    }
    Ok(())
}
