//! The bearer token and its validity window.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};

/// A token closer than this to its expiry is treated as stale.
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 5 * 60;

/// Observable state of the credential manager's token slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token yet; the first refresh will create one.
    Uninitialized,
    /// Token expires more than the buffer from now.
    Valid,
    /// Token is expired, about to expire, or of unknown age.
    Stale,
    /// The last attempt to obtain a token failed and no valid one is held.
    Unauthenticated,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Uninitialized => "uninitialized",
            TokenState::Valid => "token-valid",
            TokenState::Stale => "token-stale",
            TokenState::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable token snapshot. Replaced as a whole, never edited in place.
#[derive(Debug, Clone)]
pub struct Token {
    value: SecretString,
    expires: DateTime<Utc>,
}

impl Token {
    pub fn new(value: SecretString, expires: DateTime<Utc>) -> Self {
        Self { value, expires }
    }

    /// A token of unknown age. Its expiry is set in the past so the first
    /// use goes through the refresh path.
    pub fn bootstrap(value: SecretString) -> Self {
        Self {
            value,
            expires: DateTime::UNIX_EPOCH,
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.value
    }

    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// Valid iff the expiry lies strictly beyond `now` plus the buffer.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires > now + TimeDelta::seconds(TOKEN_EXPIRY_BUFFER_SECS)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
