//! Nginx Proxy Manager API surface.
//!
//! Only three endpoints are used:
//!
//! ```text
//! POST /api/tokens              {identity, secret} -> {token, expires}
//! GET  /api/tokens              bearer             -> {token, expires}
//! POST /api/nginx/proxy-hosts   bearer + host body -> 200/201, 400 if it already exists
//! ```
//!
//! [`ProxyManagerApi`] is the seam between the credential manager / proxy
//! host client and the wire. [`NpmClient`] is the reqwest implementation;
//! tests substitute [`crate::testing::StubProxyApi`].

pub mod client;
pub mod types;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ApiError;

pub use client::NpmClient;
pub use types::{ApiResponse, ProxyHostRequest, TokenGrant};

/// Raw calls against the proxy-manager API. No retries, no interpretation
/// of domain semantics beyond decoding.
#[async_trait]
pub trait ProxyManagerApi: Send + Sync {
    /// Exchange an identity/secret pair for a token.
    async fn create_token(
        &self,
        identity: &str,
        secret: &SecretString,
    ) -> Result<TokenGrant, ApiError>;

    /// Trade a still-accepted token for a fresh one.
    async fn refresh_token(&self, bearer: &SecretString) -> Result<TokenGrant, ApiError>;

    /// Issue the proxy-host create call.
    ///
    /// Any HTTP status is returned as `Ok`; only a missing response is an
    /// error, so callers can apply their own status policy.
    async fn create_proxy_host(
        &self,
        bearer: &SecretString,
        request: &ProxyHostRequest,
    ) -> Result<ApiResponse, ApiError>;
}
