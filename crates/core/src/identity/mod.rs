//! Browser-like search identities and the session manager that reacts to blocking.
//!
//! Each worker owns one [`SessionState`] for the lifetime of its trip unit.
//! [`IdentityManager`] builds those states (warmup included) and issues API
//! requests through them, rotating proxies on connectivity failures and
//! backing off when the upstream denies access.

mod manager;
mod profile;
mod session;

pub use manager::{pause, IdentityManager};
pub use profile::{random_profile, BrowserProfile, BROWSER_PROFILES};
pub use session::{SearchIdentity, SessionState};

use thiserror::Error;

use crate::upstream::TransportError;

/// Errors for identity and session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("cancelled")]
    Cancelled,
}

impl SessionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Cancelled)
    }
}
