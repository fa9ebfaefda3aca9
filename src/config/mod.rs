//! Configuration for npm-autoproxy.
//!
//! Everything comes from the environment; `main` loads `.env` (or the file
//! given with `--env-file`) through dotenvy before [`Config::from_env`]
//! runs, so real environment variables win over the file.

pub(crate) mod helpers;
mod npm;
mod reconcile;

use crate::error::ConfigError;

pub use self::npm::NpmConfig;
pub use self::reconcile::{ReconcileConfig, override_key};

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub npm: NpmConfig,
    pub reconcile: ReconcileConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            npm: NpmConfig::resolve()?,
            reconcile: ReconcileConfig::resolve()?,
        })
    }
}

/// Reconciliation settings alone; enough for a dry run, which needs no
/// proxy-manager credential.
pub fn reconcile_from_env() -> Result<ReconcileConfig, ConfigError> {
    ReconcileConfig::resolve()
}
