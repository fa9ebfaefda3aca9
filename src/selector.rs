//! Pick the one container, port and scheme that serves an application.
//!
//! Without an override the preference is https on 443, then http on 80,
//! then the first port of the first container that exposes anything.
//! "First" is provider order, which Docker does not promise to keep stable
//! between calls; ties between containers on the same port are therefore
//! not deterministic across passes.

use std::str::FromStr;

use serde::Serialize;

use crate::error::ReconcileError;
use crate::resolver::{EligibleContainer, NAMESPACE_PREFIX};

const HTTPS_PORT: u16 = 443;
const HTTP_PORT: u16 = 80;

/// Scheme the proxy uses to reach the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardScheme {
    Http,
    Https,
}

impl ForwardScheme {
    /// https only for 443.
    pub fn for_port(port: u16) -> Self {
        if port == HTTPS_PORT {
            ForwardScheme::Https
        } else {
            ForwardScheme::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardScheme::Http => "http",
            ForwardScheme::Https => "https",
        }
    }
}

impl std::fmt::Display for ForwardScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator directive pinning an application to one container and port.
///
/// Written as `<container-name-suffix>:<port>`, e.g. `webui:8080`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub suffix: String,
    pub port: u16,
}

impl FromStr for Override {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (suffix, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected '<container-suffix>:<port>', got '{s}'"))?;
        let suffix = suffix.trim();
        if suffix.is_empty() {
            return Err(format!("container suffix is empty in '{s}'"));
        }
        let port = port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| format!("invalid port in '{s}'"))?;

        Ok(Self {
            suffix: suffix.to_string(),
            port,
        })
    }
}

/// Where proxied traffic for one application goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget<'a> {
    pub container: &'a EligibleContainer,
    pub scheme: ForwardScheme,
    pub port: u16,
}

/// Select the target for `application` among its eligible containers.
///
/// `Ok(None)` means nothing is exposed. With an override, anything other
/// than exactly one matching container is an error.
pub fn select_target<'a>(
    application: &str,
    containers: &'a [EligibleContainer],
    directive: Option<&Override>,
) -> Result<Option<ProxyTarget<'a>>, ReconcileError> {
    match directive {
        Some(directive) => select_override(application, containers, directive).map(Some),
        None => Ok(select_automatic(containers)),
    }
}

fn select_automatic(containers: &[EligibleContainer]) -> Option<ProxyTarget<'_>> {
    let exposing: Vec<&EligibleContainer> = containers
        .iter()
        .filter(|c| !c.record.ports.is_empty())
        .collect();

    for port in [HTTPS_PORT, HTTP_PORT] {
        if let Some(container) = exposing.iter().copied().find(|c| c.record.exposes(port)) {
            return Some(ProxyTarget {
                container,
                scheme: ForwardScheme::for_port(port),
                port,
            });
        }
    }

    let container = exposing.first().copied()?;
    Some(ProxyTarget {
        container,
        scheme: ForwardScheme::Http,
        port: container.record.ports[0],
    })
}

fn select_override<'a>(
    application: &str,
    containers: &'a [EligibleContainer],
    directive: &Override,
) -> Result<ProxyTarget<'a>, ReconcileError> {
    let expected = format!("{}{}-{}", NAMESPACE_PREFIX, application, directive.suffix)
        .to_lowercase()
        .replace('_', "-");

    let matches: Vec<&EligibleContainer> = containers
        .iter()
        .filter(|c| {
            c.record
                .names
                .iter()
                .any(|name| normalize_container_name(name) == expected)
        })
        .collect();

    match matches.as_slice() {
        [container] => Ok(ProxyTarget {
            container: *container,
            // The override port is trusted as-is; declared ports are not consulted.
            scheme: ForwardScheme::for_port(directive.port),
            port: directive.port,
        }),
        _ => Err(ReconcileError::OverrideMismatch {
            application: application.to_string(),
            suffix: directive.suffix.clone(),
            matches: matches.len(),
        }),
    }
}

/// Canonical form of a container name: no leading slash, lowercase, `-`
/// separators, and the trailing replica ordinal removed.
///
/// `/ix-radarr_webui_1` and `ix-radarr-webui-1` both become `ix-radarr-webui`.
pub fn normalize_container_name(name: &str) -> String {
    let name = name
        .trim_start_matches('/')
        .to_lowercase()
        .replace('_', "-");

    match name.rsplit_once('-') {
        Some((stem, ordinal))
            if !stem.is_empty()
                && !ordinal.is_empty()
                && ordinal.bytes().all(|b| b.is_ascii_digit()) =>
        {
            stem.to_string()
        }
        _ => name,
    }
}
