//! Records in, proxy-host request out. No I/O.

use crate::config::ReconcileConfig;
use crate::docker::ContainerRecord;
use crate::error::ReconcileError;
use crate::npm::ProxyHostRequest;
use crate::resolver::{application_of, eligible_containers};
use crate::selector::select_target;

/// The proxy host one application should get, and which container serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedHost {
    pub container: String,
    pub request: ProxyHostRequest,
}

/// Result of planning one application.
#[derive(Debug)]
pub enum PlanStatus {
    Blacklisted,
    NoTarget,
    Ready(PlannedHost),
    Invalid(ReconcileError),
}

#[derive(Debug)]
pub struct PlanEntry {
    pub application: String,
    pub status: PlanStatus,
}

/// Build the request for `application` from the records of its project.
///
/// `Ok(None)` when no eligible container exposes a port.
pub fn plan_application(
    config: &ReconcileConfig,
    application: &str,
    records: &[ContainerRecord],
) -> Result<Option<PlannedHost>, ReconcileError> {
    let eligible = eligible_containers(records);
    let Some(target) = select_target(application, &eligible, config.override_for(application))?
    else {
        return Ok(None);
    };

    Ok(Some(PlannedHost {
        container: target.container.record.display_name().to_string(),
        request: ProxyHostRequest {
            domain_name: config.domain_for(application),
            forward_scheme: target.scheme,
            forward_host: target.container.internal_host.clone(),
            forward_port: target.port,
            certificate_id: config.certificate_id,
        },
    }))
}

/// Group records by application, keeping the order in which each
/// application first appears. Records outside the namespace are dropped.
pub fn group_by_application(records: Vec<ContainerRecord>) -> Vec<(String, Vec<ContainerRecord>)> {
    let mut groups: Vec<(String, Vec<ContainerRecord>)> = Vec::new();
    for record in records {
        let Some(application) = application_of(&record) else {
            continue;
        };
        match groups.iter_mut().find(|(app, _)| *app == application) {
            Some((_, members)) => members.push(record),
            None => groups.push((application, vec![record])),
        }
    }
    groups
}

/// Plan every application found in `records`.
pub fn plan(config: &ReconcileConfig, records: Vec<ContainerRecord>) -> Vec<PlanEntry> {
    group_by_application(records)
        .into_iter()
        .map(|(application, members)| {
            let status = if config.is_blacklisted(&application) {
                PlanStatus::Blacklisted
            } else {
                match plan_application(config, &application, &members) {
                    Ok(Some(planned)) => PlanStatus::Ready(planned),
                    Ok(None) => PlanStatus::NoTarget,
                    Err(e) => PlanStatus::Invalid(e),
                }
            };
            PlanEntry {
                application,
                status,
            }
        })
        .collect()
}
