//! Application identity and routable address of a container.
//!
//! Pure functions over [`ContainerRecord`]: a container belongs to the
//! managed platform when its compose project carries the `ix-` prefix, its
//! application is the project with that prefix removed, and it is reachable
//! inside the cluster at `<service>.<project>.svc.cluster.local`.

use crate::docker::ContainerRecord;

/// Project-label prefix marking containers of the managed platform.
pub const NAMESPACE_PREFIX: &str = "ix-";

/// Suffix of in-cluster service addresses.
pub const CLUSTER_DOMAIN: &str = "svc.cluster.local";

/// Why a container cannot be proxied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// No project label, or one without the namespace prefix.
    OutsideNamespace,
    /// In the namespace but without a service label.
    MissingService,
    /// `none`, `host`, or sharing another container's network namespace.
    NetworkMode(String),
}

impl std::fmt::Display for Ineligible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ineligible::OutsideNamespace => write!(f, "outside the {NAMESPACE_PREFIX} namespace"),
            Ineligible::MissingService => write!(f, "missing service label"),
            Ineligible::NetworkMode(mode) => write!(f, "network mode '{mode}' is not routable"),
        }
    }
}

/// A container that can receive proxied traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleContainer {
    pub record: ContainerRecord,
    pub application: String,
    pub internal_host: String,
}

/// Application name for a project label, `None` outside the namespace.
pub fn application_name(project: &str) -> Option<&str> {
    project
        .strip_prefix(NAMESPACE_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Application a container belongs to, regardless of routability.
pub fn application_of(record: &ContainerRecord) -> Option<String> {
    record
        .project()
        .and_then(application_name)
        .map(str::to_string)
}

/// Whether a container with this network mode has its own address.
pub fn is_routable_network_mode(mode: &str) -> bool {
    !(mode == "none"
        || mode == "host"
        || mode.starts_with("container:")
        || mode.starts_with("service:"))
}

pub fn internal_host(service: &str, project: &str) -> String {
    format!("{service}.{project}.{CLUSTER_DOMAIN}")
}

/// Decide whether `record` can be a proxy target.
pub fn resolve(record: &ContainerRecord) -> Result<EligibleContainer, Ineligible> {
    if !is_routable_network_mode(&record.network_mode) {
        return Err(Ineligible::NetworkMode(record.network_mode.clone()));
    }

    let project = record.project().ok_or(Ineligible::OutsideNamespace)?;
    let application = application_name(project).ok_or(Ineligible::OutsideNamespace)?;
    let service = record.service().ok_or(Ineligible::MissingService)?;

    Ok(EligibleContainer {
        application: application.to_string(),
        internal_host: internal_host(service, project),
        record: record.clone(),
    })
}

/// Resolve every record, logging and dropping the ineligible ones.
pub fn eligible_containers(records: &[ContainerRecord]) -> Vec<EligibleContainer> {
    records
        .iter()
        .filter_map(|record| match resolve(record) {
            Ok(eligible) => Some(eligible),
            Err(reason) => {
                tracing::debug!("Skipping container {}: {}", record.display_name(), reason);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::compose_container;

    #[test]
    fn resolves_application_and_internal_host() {
        let record = compose_container("c1", "ix-radarr_radarr_1", "ix-radarr", "radarr", &[7878]);
        let eligible = resolve(&record).unwrap();
        assert_eq!(eligible.application, "radarr");
        assert_eq!(
            eligible.internal_host,
            "radarr.ix-radarr.svc.cluster.local"
        );
    }

    #[test]
    fn non_routable_network_modes_are_never_eligible() {
        for mode in ["none", "host", "container:abc123", "service:vpn"] {
            let record = compose_container("c1", "ix-qbit_qbit_1", "ix-qbit", "qbit", &[8080])
                .with_network_mode(mode);
            assert_eq!(
                resolve(&record),
                Err(Ineligible::NetworkMode(mode.to_string())),
                "mode {mode} should be ineligible"
            );
        }

        // Outside the namespace it is still the network mode that disqualifies it.
        let record = compose_container("c2", "other_web_1", "other", "web", &[80])
            .with_network_mode("host");
        assert!(matches!(resolve(&record), Err(Ineligible::NetworkMode(_))));
    }

    #[test]
    fn bridge_and_named_networks_are_routable() {
        assert!(is_routable_network_mode("bridge"));
        assert!(is_routable_network_mode("ix-radarr_default"));
        assert!(is_routable_network_mode(""));
    }

    #[test]
    fn containers_outside_namespace_are_ineligible() {
        let record = compose_container("c1", "web_1", "myproject", "web", &[80]);
        assert_eq!(resolve(&record), Err(Ineligible::OutsideNamespace));
        assert_eq!(application_of(&record), None);

        let bare_prefix = compose_container("c2", "x", "ix-", "web", &[80]);
        assert_eq!(resolve(&bare_prefix), Err(Ineligible::OutsideNamespace));
    }

    #[test]
    fn missing_service_label_is_ineligible() {
        let mut record = compose_container("c1", "ix-app_1", "ix-app", "svc", &[80]);
        record.labels.remove(crate::docker::SERVICE_LABEL);
        assert_eq!(resolve(&record), Err(Ineligible::MissingService));
        // The application is still known, so siblings can be reconciled.
        assert_eq!(application_of(&record).as_deref(), Some("app"));
    }

    #[test]
    fn eligible_containers_keeps_provider_order() {
        let records = vec![
            compose_container("a", "ix-app_db_1", "ix-app", "db", &[5432]),
            compose_container("b", "ix-app_vpn_1", "ix-app", "vpn", &[]).with_network_mode("host"),
            compose_container("c", "ix-app_web_1", "ix-app", "web", &[80]),
        ];
        let ids: Vec<_> = eligible_containers(&records)
            .into_iter()
            .map(|c| c.record.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
