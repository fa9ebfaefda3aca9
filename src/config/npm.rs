use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::auth::Credential;
use crate::config::helpers::{optional_env, parse_optional_env, parse_string_env, require_env};
use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 81;
const DEFAULT_REFRESH_MINUTES: i64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Proxy-manager connection and authentication settings.
#[derive(Debug, Clone)]
pub struct NpmConfig {
    /// API base URL, e.g. `http://npm.local:81`.
    pub base_url: Url,
    pub credential: Credential,
    /// Period of the background token refresh; `None` disables it.
    pub refresh_interval: Option<Duration>,
    pub request_timeout: Duration,
}

impl NpmConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let host = require_env("NPM_HOST", "Set NPM_HOST to the proxy manager's host name")?;
        let port: u16 = parse_optional_env("NPM_PORT", DEFAULT_PORT)?;
        let scheme = parse_string_env("NPM_SCHEME", "http")?.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidValue {
                key: "NPM_SCHEME".to_string(),
                message: format!("expected 'http' or 'https', got '{scheme}'"),
            });
        }

        let base_url = Url::parse(&format!("{scheme}://{host}:{port}")).map_err(|e| {
            ConfigError::InvalidValue {
                key: "NPM_HOST".to_string(),
                message: e.to_string(),
            }
        })?;

        let minutes: i64 = parse_optional_env("NPM_TOKEN_REFRESH_MINUTES", DEFAULT_REFRESH_MINUTES)?;
        let refresh_interval = refresh_period(minutes)?;

        let timeout_secs: u64 =
            parse_optional_env("NPM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            base_url,
            credential: resolve_credential()?,
            refresh_interval,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

/// `None` for a non-positive number of minutes.
fn refresh_period(minutes: i64) -> Result<Option<Duration>, ConfigError> {
    if minutes <= 0 {
        return Ok(None);
    }
    u64::try_from(minutes)
        .ok()
        .and_then(|m| m.checked_mul(60))
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "NPM_TOKEN_REFRESH_MINUTES".to_string(),
            message: format!("{minutes} minutes is out of range"),
        })
}

/// The identity/secret pair wins over a bootstrap token when both are set.
fn resolve_credential() -> Result<Credential, ConfigError> {
    let identity = optional_env("NPM_IDENTITY")?;
    let secret = optional_env("NPM_SECRET")?;
    let token = optional_env("NPM_TOKEN")?;

    match (identity, secret, token) {
        (Some(identity), Some(secret), _) => Ok(Credential::Password {
            identity,
            secret: SecretString::from(secret),
        }),
        (_, _, Some(token)) => Ok(Credential::BootstrapToken(SecretString::from(token))),
        (Some(_), None, None) => Err(ConfigError::MissingRequired {
            key: "NPM_SECRET".to_string(),
            hint: "NPM_IDENTITY is set but its secret is not".to_string(),
        }),
        (None, Some(_), None) => Err(ConfigError::MissingRequired {
            key: "NPM_IDENTITY".to_string(),
            hint: "NPM_SECRET is set but its identity is not".to_string(),
        }),
        (None, None, None) => Err(ConfigError::MissingRequired {
            key: "NPM_IDENTITY/NPM_SECRET or NPM_TOKEN".to_string(),
            hint: "Provide an identity/secret pair or a bootstrap token".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::config::tests::{ENV_MUTEX, clear_env};

    #[test]
    fn defaults_with_password_credential() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
            std::env::set_var("NPM_IDENTITY", "admin@example.com");
            std::env::set_var("NPM_SECRET", "changeme");
        }

        let config = NpmConfig::resolve().expect("resolve should succeed");
        assert_eq!(config.base_url.as_str(), "http://npm.lan:81/");
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(3600)));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(matches!(
            config.credential,
            Credential::Password { ref identity, .. } if identity == "admin@example.com"
        ));

        clear_env();
    }

    #[test]
    fn pair_is_preferred_over_token() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
            std::env::set_var("NPM_IDENTITY", "admin@example.com");
            std::env::set_var("NPM_SECRET", "changeme");
            std::env::set_var("NPM_TOKEN", "bootstrap");
        }

        let config = NpmConfig::resolve().expect("resolve should succeed");
        assert!(matches!(config.credential, Credential::Password { .. }));

        clear_env();
    }

    #[test]
    fn token_alone_is_bootstrap_credential() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
            std::env::set_var("NPM_TOKEN", "bootstrap");
            std::env::set_var("NPM_IDENTITY", "admin@example.com");
        }

        let config = NpmConfig::resolve().expect("half pair plus token is fine");
        match config.credential {
            Credential::BootstrapToken(token) => assert_eq!(token.expose_secret(), "bootstrap"),
            other => panic!("expected bootstrap token, got {other:?}"),
        }

        clear_env();
    }

    #[test]
    fn missing_or_half_credentials_are_fatal() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
        }
        assert!(matches!(
            NpmConfig::resolve(),
            Err(ConfigError::MissingRequired { .. })
        ));

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_IDENTITY", "admin@example.com");
        }
        let err = NpmConfig::resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "NPM_SECRET"));

        clear_env();
    }

    #[test]
    fn non_positive_refresh_interval_disables_timer() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
            std::env::set_var("NPM_TOKEN", "bootstrap");
            std::env::set_var("NPM_TOKEN_REFRESH_MINUTES", "0");
        }
        assert_eq!(NpmConfig::resolve().unwrap().refresh_interval, None);

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_TOKEN_REFRESH_MINUTES", "-5");
        }
        assert_eq!(NpmConfig::resolve().unwrap().refresh_interval, None);

        clear_env();
    }

    #[test]
    fn oversized_refresh_interval_is_rejected() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
            std::env::set_var("NPM_TOKEN", "bootstrap");
            std::env::set_var("NPM_TOKEN_REFRESH_MINUTES", "4611686018427387904");
        }
        let err = NpmConfig::resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "NPM_TOKEN_REFRESH_MINUTES"
        ));

        clear_env();
    }

    #[test]
    fn scheme_and_port_are_validated() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_HOST", "npm.lan");
            std::env::set_var("NPM_TOKEN", "bootstrap");
            std::env::set_var("NPM_SCHEME", "HTTPS");
            std::env::set_var("NPM_PORT", "8443");
        }
        assert_eq!(
            NpmConfig::resolve().unwrap().base_url.as_str(),
            "https://npm.lan:8443/"
        );

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_SCHEME", "ftp");
        }
        assert!(matches!(
            NpmConfig::resolve(),
            Err(ConfigError::InvalidValue { .. })
        ));

        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("NPM_SCHEME", "http");
            std::env::set_var("NPM_PORT", "not-a-port");
        }
        assert!(matches!(
            NpmConfig::resolve(),
            Err(ConfigError::InvalidValue { .. })
        ));

        clear_env();
    }
}
