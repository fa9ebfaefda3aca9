//! Error types for npm-autoproxy.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the container metadata provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Docker not available: {reason}")]
    DockerNotAvailable { reason: String },

    #[error("Failed to list containers: {reason}")]
    ListFailed { reason: String },

    #[error("Container event stream failed: {reason}")]
    EventStream { reason: String },
}

/// Raw outcome of a failed call against the proxy-manager API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No response was received at all (connect error, timeout, reset).
    #[error("no response from proxy manager: {reason}")]
    NoResponse { reason: String },

    /// A success status carried a body we could not decode.
    #[error("invalid response from proxy manager: {reason}")]
    InvalidResponse { reason: String },
}

/// Errors raised by the credential manager.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity/secret pair was rejected.
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    /// No usable token, or the token exchange/refresh was rejected.
    #[error("Token error: {reason}")]
    Token { reason: String },

    /// The proxy manager could not be reached.
    #[error("Network error: {reason}")]
    Network { reason: String },
}

impl AuthError {
    /// Only network failures are worth retrying; the rest are terminal for
    /// the operation that hit them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Network { .. })
    }
}

/// Errors raised by the proxy configuration client.
#[derive(Debug, Error)]
pub enum ProxyHostError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Proxy host '{domain}' rejected with HTTP {status}: {body}")]
    Rejected {
        domain: String,
        status: u16,
        body: String,
    },

    #[error("Network error creating proxy host '{domain}': {reason}")]
    Network { domain: String, reason: String },
}

/// Errors that abort the reconciliation of a single application.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// An operator override matched zero or several containers.
    #[error(
        "Override '{suffix}' for application '{application}' matched {matches} containers, expected exactly one"
    )]
    OverrideMismatch {
        application: String,
        suffix: String,
        matches: usize,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    ProxyHost(#[from] ProxyHostError),
}
