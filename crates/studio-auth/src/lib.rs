//! Studio credential primitives
//!
//! Everything the session client needs to know about credentials without
//! knowing how calls are dispatched: the API response envelope, the set of
//! credential-issuing endpoints, the credential store contract with memory
//! and file implementations, and the two exchanges that bypass the normal
//! request pipeline (refresh and logout).
//!
//! Credential flow:
//! 1. `/login` returns a `TokenPair`, written via `CredentialStore::set()`
//! 2. Ordinary calls read the access token from `CredentialStore::get()`
//! 3. On an expired access token, `token::refresh_session()` rotates the pair
//! 4. On sign-out, `CredentialStore::clear()` runs first, then
//!    `token::revoke_session()` best-effort

pub mod constants;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore, StoreFuture,
};
pub use envelope::{Envelope, RefreshTokenBody, TokenPair};
pub use error::{Error, Result};
pub use token::{refresh_session, revoke_session};
