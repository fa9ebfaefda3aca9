use crate::proxy_host::ProxyHostOutcome;

/// How one application's reconciliation ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationOutcome {
    Configured(ProxyHostOutcome),
    NoTarget,
    Blacklisted,
}

/// Tally of a sweep over every running application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Created, or already present on the proxy manager.
    pub configured: Vec<String>,
    pub skipped_blacklisted: Vec<String>,
    pub no_target: Vec<String>,
    /// Application and the error that aborted it.
    pub failed: Vec<(String, String)>,
}

impl SweepReport {
    pub fn record(&mut self, application: &str, outcome: ApplicationOutcome) {
        let application = application.to_string();
        match outcome {
            ApplicationOutcome::Configured(_) => self.configured.push(application),
            ApplicationOutcome::NoTarget => self.no_target.push(application),
            ApplicationOutcome::Blacklisted => self.skipped_blacklisted.push(application),
        }
    }

    pub fn record_failure(&mut self, application: &str, error: impl std::fmt::Display) {
        self.failed
            .push((application.to_string(), error.to_string()));
    }

    pub fn total(&self) -> usize {
        self.configured.len()
            + self.skipped_blacklisted.len()
            + self.no_target.len()
            + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} applications: {} configured, {} blacklisted, {} without target, {} failed",
            self.total(),
            self.configured.len(),
            self.skipped_blacklisted.len(),
            self.no_target.len(),
            self.failed.len()
        )
    }
}
