//! Idempotent "ensure this proxy host exists" call.

use std::sync::Arc;

use crate::auth::CredentialManager;
use crate::error::{ApiError, ProxyHostError};
use crate::npm::{ApiResponse, ProxyHostRequest, ProxyManagerApi};

/// What happened to a proxy host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyHostOutcome {
    /// The proxy manager created it (200/201).
    Created,
    /// The proxy manager refused with 400, which it does for a domain that
    /// is already configured.
    AlreadyConfigured,
}

/// Creates proxy hosts with a token from the credential manager.
///
/// Never retries; the caller decides what a failure means.
pub struct ProxyHostClient {
    api: Arc<dyn ProxyManagerApi>,
    credentials: Arc<CredentialManager>,
}

impl ProxyHostClient {
    pub fn new(api: Arc<dyn ProxyManagerApi>, credentials: Arc<CredentialManager>) -> Self {
        Self { api, credentials }
    }

    pub async fn ensure_proxy_host(
        &self,
        request: &ProxyHostRequest,
    ) -> Result<ProxyHostOutcome, ProxyHostError> {
        let token = self.credentials.ensure_valid_token().await?;

        match self.api.create_proxy_host(token.secret(), request).await {
            Ok(ApiResponse { status: 200 | 201, .. }) => {
                tracing::info!(
                    "Created proxy host {} -> {}://{}:{}",
                    request.domain_name,
                    request.forward_scheme,
                    request.forward_host,
                    request.forward_port
                );
                Ok(ProxyHostOutcome::Created)
            }
            Ok(ApiResponse { status: 400, body }) => {
                tracing::warn!(
                    "Proxy host {} not created, probably already configured: {}",
                    request.domain_name,
                    body
                );
                Ok(ProxyHostOutcome::AlreadyConfigured)
            }
            Ok(ApiResponse { status, body }) | Err(ApiError::Status { status, body }) => {
                Err(ProxyHostError::Rejected {
                    domain: request.domain_name.clone(),
                    status,
                    body,
                })
            }
            Err(ApiError::NoResponse { reason } | ApiError::InvalidResponse { reason }) => {
                Err(ProxyHostError::Network {
                    domain: request.domain_name.clone(),
                    reason,
                })
            }
        }
    }
}
