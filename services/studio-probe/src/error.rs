//! Command-line errors

use thiserror::Error;

/// Errors raised by the binary itself once argv has been parsed.
///
/// Everything else (config, store, API calls) carries its own crate's error
/// type and is wrapped with `anyhow` context in `main`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no password configured: set STUDIO_PASSWORD or session.password_file")]
    MissingPassword,
}
