//! Startup credential for the proxy-manager API.

use secrecy::SecretString;

/// How the process authenticates against the proxy manager.
///
/// Exactly one variant is active for the lifetime of the process.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Identity/secret pair, exchanged for a token via `POST /api/tokens`.
    /// Allows re-creating a token whenever refreshing fails.
    Password {
        identity: String,
        secret: SecretString,
    },
    /// Pre-issued token. Can only be kept alive by refreshing it.
    BootstrapToken(SecretString),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password { .. } => "identity/secret",
            Credential::BootstrapToken(_) => "bootstrap token",
        }
    }
}
