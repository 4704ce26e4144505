//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The login password is loaded from STUDIO_PASSWORD or password_file,
//! never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use studio_session::ClientConfig;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Studio API connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

/// Local session settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the login password (alternative to STUDIO_PASSWORD)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            password: None,
            password_file: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_content_type() -> String {
    "application/json".into()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("studio-session.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Password resolution order:
    /// 1. STUDIO_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.api.content_type.trim().is_empty() {
            return Err(common::Error::Config("content_type must not be empty".into()));
        }

        if let Ok(password) = std::env::var("STUDIO_PASSWORD") {
            config.session.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = config.session.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim_end_matches(['\r', '\n']).to_owned();
            if !password.is_empty() {
                config.session.password = Some(Secret::new(password));
            }
        }

        Ok(config)
    }

    /// Session client settings derived from `[api]`.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api.base_url.clone())
            .with_timeout(Duration::from_secs(self.api.timeout_secs))
            .with_content_type(self.api.content_type.clone())
    }
}
