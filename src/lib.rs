//! npm-autoproxy: registers orchestrated application containers with
//! Nginx Proxy Manager.
//!
//! Containers whose compose project carries the `ix-` prefix are grouped
//! into applications. For each application one container, port and scheme
//! is selected and a proxy host `<application>.<DOMAIN>` is created that
//! forwards to `<service>.<project>.svc.cluster.local`. A startup sweep
//! covers everything already running; container start events cover the
//! rest.

pub mod auth;
pub mod cli;
pub mod config;
pub mod docker;
pub mod error;
pub mod npm;
pub mod proxy_host;
pub mod reconcile;
pub mod resolver;
pub mod selector;
pub mod testing;

pub use config::Config;
pub use error::{ApiError, AuthError, ConfigError, ProviderError, ProxyHostError, ReconcileError};
