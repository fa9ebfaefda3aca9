//! Proxy-manager authorization.
//!
//! ```text
//!   Credential::Password ──▶ uninitialized ──create──▶ token-valid
//!   Credential::BootstrapToken ──▶ token-stale ──refresh──▶ token-valid
//!
//!   token-valid ──(expiry within 5 min)──▶ token-stale
//!   token-stale ──refresh ok──▶ token-valid
//!   token-stale ──refresh fails──▶ create (password only) ──ok──▶ token-valid
//!                                   └──fails / no password──▶ unauthenticated
//! ```
//!
//! A background [`RefreshTask`] refreshes on a fixed period so the token
//! never lapses while the process idles between container events.

pub mod credential;
pub mod manager;
pub mod token;

pub use credential::Credential;
pub use manager::{CredentialManager, RefreshTask};
pub use token::{TOKEN_EXPIRY_BUFFER_SECS, Token, TokenState};
