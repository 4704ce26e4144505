//! Common types for the Studio session workspace

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
