use std::collections::HashMap;
use std::time::Duration;

use crate::config::helpers::{optional_env, parse_optional_env, require_env};
use crate::error::ConfigError;
use crate::selector::Override;

const OVERRIDE_PREFIX: &str = "APP_OVERRIDE_";
const DEFAULT_SETTLE_DELAY_SECS: u64 = 10;

/// What to create and for which applications.
#[derive(Debug, Clone, Default)]
pub struct ReconcileConfig {
    /// Hostnames are `<application>.<domain>`.
    pub domain: String,
    pub certificate_id: u64,
    /// Lowercased application names never reconciled.
    pub blacklist: Vec<String>,
    /// Keyed by [`override_key`].
    pub overrides: HashMap<String, Override>,
    /// Wait after a start event before reconciling.
    pub settle_delay: Duration,
}

impl ReconcileConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let domain = require_env("DOMAIN", "Set DOMAIN to the suffix for generated hostnames")?;
        let domain = domain.trim_matches('.').to_string();

        let blacklist = optional_env("APP_BLACKLIST")?
            .map(|raw| parse_blacklist(&raw))
            .unwrap_or_default();

        Ok(Self {
            domain,
            certificate_id: parse_optional_env("NPM_CERTIFICATE_ID", 0)?,
            blacklist,
            overrides: overrides_from_env()?,
            settle_delay: Duration::from_secs(parse_optional_env(
                "SETTLE_DELAY_SECS",
                DEFAULT_SETTLE_DELAY_SECS,
            )?),
        })
    }

    pub fn is_blacklisted(&self, application: &str) -> bool {
        let application = application.to_lowercase();
        self.blacklist.iter().any(|b| *b == application)
    }

    pub fn override_for(&self, application: &str) -> Option<&Override> {
        self.overrides.get(&override_key(application))
    }

    /// Public hostname for an application.
    pub fn domain_for(&self, application: &str) -> String {
        format!("{application}.{}", self.domain)
    }
}

/// `APP_OVERRIDE_<KEY>` suffix for an application: upper-cased, `-` as `_`.
pub fn override_key(application: &str) -> String {
    application.to_uppercase().replace('-', "_")
}

fn parse_blacklist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn overrides_from_env() -> Result<HashMap<String, Override>, ConfigError> {
    let mut overrides = HashMap::new();
    for (key, value) in std::env::vars_os() {
        let Some(key) = key.to_str() else { continue };
        let Some(app) = key.strip_prefix(OVERRIDE_PREFIX) else {
            continue;
        };
        if app.is_empty() {
            continue;
        }

        let value = value.to_str().ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        })?;
        if value.trim().is_empty() {
            continue;
        }

        let directive = value
            .parse::<Override>()
            .map_err(|message| ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            })?;
        overrides.insert(override_key(app), directive);
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::tests::{ENV_MUTEX, clear_env};

    #[test]
    fn blacklist_is_trimmed_and_case_insensitive() {
        assert_eq!(
            parse_blacklist(" Plex, ,radarr ,"),
            vec!["plex".to_string(), "radarr".to_string()]
        );

        let config = ReconcileConfig {
            blacklist: parse_blacklist("plex"),
            ..Default::default()
        };
        assert!(config.is_blacklisted("plex"));
        assert!(config.is_blacklisted("Plex"));
        assert!(!config.is_blacklisted("plexamp"));
    }

    #[test]
    fn override_key_matches_env_naming() {
        assert_eq!(override_key("radarr"), "RADARR");
        assert_eq!(override_key("home-assistant"), "HOME_ASSISTANT");
    }

    #[test]
    fn resolves_from_env() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("DOMAIN", "home.example.com.");
            std::env::set_var("APP_BLACKLIST", "plex,ix-chart");
            std::env::set_var("APP_OVERRIDE_HOME_ASSISTANT", "webui:8123");
            std::env::set_var("NPM_CERTIFICATE_ID", "7");
            std::env::set_var("SETTLE_DELAY_SECS", "3");
        }

        let config = ReconcileConfig::resolve().expect("resolve should succeed");
        assert_eq!(config.domain, "home.example.com");
        assert_eq!(config.domain_for("radarr"), "radarr.home.example.com");
        assert_eq!(config.certificate_id, 7);
        assert_eq!(config.settle_delay, Duration::from_secs(3));
        assert!(config.is_blacklisted("plex"));
        assert_eq!(
            config.override_for("home-assistant"),
            Some(&Override {
                suffix: "webui".to_string(),
                port: 8123
            })
        );
        assert_eq!(config.override_for("radarr"), None);

        clear_env();
    }

    #[test]
    fn malformed_override_is_invalid() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        // SAFETY: Under ENV_MUTEX.
        unsafe {
            std::env::set_var("DOMAIN", "example.com");
            std::env::set_var("APP_OVERRIDE_RADARR", "webui");
        }

        let err = ReconcileConfig::resolve().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "APP_OVERRIDE_RADARR")
        );

        clear_env();
    }

    #[test]
    fn domain_is_required() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        assert!(matches!(
            ReconcileConfig::resolve(),
            Err(ConfigError::MissingRequired { ref key, .. }) if key == "DOMAIN"
        ));
    }
}
