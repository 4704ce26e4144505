//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use studio_session::ApiRequest;

#[derive(Debug, Parser)]
#[command(name = "studio-probe")]
#[command(version, about = "Call the Studio API with a persisted, self-refreshing session")]
pub struct Cli {
    /// TOML config file
    #[arg(
        long,
        global = true,
        env = "CONFIG_PATH",
        default_value = "studio-probe.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// GET a path and print its data
    Get(PathArgs),

    /// DELETE a path
    Delete(PathArgs),

    /// POST an optional JSON body
    Post(BodyArgs),

    /// PUT an optional JSON body
    Put(BodyArgs),

    /// PATCH an optional JSON body
    Patch(BodyArgs),

    /// Long-running POST (image generation)
    Generate(BodyArgs),

    /// Sign in; the password comes from STUDIO_PASSWORD or session.password_file
    Login { email: String },

    /// Sign out and revoke the refresh token
    Logout,

    /// Show whether a session is stored
    Status,
}

#[derive(Debug, Args)]
pub struct PathArgs {
    /// API path relative to base_url, query string allowed
    #[arg(value_parser = parse_path)]
    pub path: String,
}

#[derive(Debug, Args)]
pub struct BodyArgs {
    /// API path relative to base_url
    #[arg(value_parser = parse_path)]
    pub path: String,

    /// JSON request body
    #[arg(value_parser = parse_json)]
    pub body: Option<serde_json::Value>,
}

/// What the binary does once the session client exists.
#[derive(Debug)]
pub enum Action {
    Call(ApiRequest),
    Login { email: String },
    Logout,
    Status,
}

impl From<Commands> for Action {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Get(args) => Action::Call(ApiRequest::get(args.path)),
            Commands::Delete(args) => Action::Call(ApiRequest::delete(args.path)),
            Commands::Post(args) => Action::Call(args.into_request(ApiRequest::post)),
            Commands::Put(args) => Action::Call(args.into_request(ApiRequest::put)),
            Commands::Patch(args) => Action::Call(args.into_request(ApiRequest::patch)),
            Commands::Generate(args) => {
                Action::Call(args.into_request(ApiRequest::post).long_running())
            }
            Commands::Login { email } => Action::Login { email },
            Commands::Logout => Action::Logout,
            Commands::Status => Action::Status,
        }
    }
}

impl BodyArgs {
    fn into_request(self, build: fn(String) -> ApiRequest) -> ApiRequest {
        let request = build(self.path);
        match self.body {
            Some(body) => request.body(body),
            None => request,
        }
    }
}

fn parse_path(raw: &str) -> Result<String, String> {
    if raw.starts_with('/') {
        Ok(raw.to_string())
    } else {
        Err(format!("path must start with '/', got {raw:?}"))
    }
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON body: {e}"))
}
