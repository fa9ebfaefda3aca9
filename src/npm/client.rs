//! reqwest-backed proxy-manager client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::ApiError;
use crate::npm::ProxyManagerApi;
use crate::npm::types::{ApiResponse, ProxyHostRequest, TokenGrant, TokenRequest, TokenResponse};

/// HTTP client for one proxy-manager instance.
pub struct NpmClient {
    client: Client,
    base_url: Url,
}

impl NpmClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::NoResponse {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, base_url })
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    async fn decode_grant(response: reqwest::Response) -> Result<TokenGrant, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(body_error)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<TokenResponse>(&body)
            .map(TokenGrant::from)
            .map_err(|e| ApiError::InvalidResponse {
                reason: format!("token response: {e}"),
            })
    }
}

fn no_response(e: reqwest::Error) -> ApiError {
    ApiError::NoResponse {
        reason: e.to_string(),
    }
}

fn body_error(e: reqwest::Error) -> ApiError {
    ApiError::NoResponse {
        reason: format!("reading response body: {e}"),
    }
}

#[async_trait]
impl ProxyManagerApi for NpmClient {
    async fn create_token(
        &self,
        identity: &str,
        secret: &SecretString,
    ) -> Result<TokenGrant, ApiError> {
        let url = self.api_url("api/tokens");
        tracing::debug!("Requesting new proxy-manager token for {}", identity);

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                identity,
                secret: secret.expose_secret(),
            })
            .send()
            .await
            .map_err(no_response)?;

        Self::decode_grant(response).await
    }

    async fn refresh_token(&self, bearer: &SecretString) -> Result<TokenGrant, ApiError> {
        let url = self.api_url("api/tokens");
        tracing::debug!("Refreshing proxy-manager token");

        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer.expose_secret())
            .send()
            .await
            .map_err(no_response)?;

        Self::decode_grant(response).await
    }

    async fn create_proxy_host(
        &self,
        bearer: &SecretString,
        request: &ProxyHostRequest,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.api_url("api/nginx/proxy-hosts");

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer.expose_secret())
            .json(&request.to_body())
            .send()
            .await
            .map_err(no_response)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(body_error)?;
        tracing::debug!(
            "Proxy host create for {} answered HTTP {}",
            request.domain_name,
            status
        );

        Ok(ApiResponse { status, body })
    }
}
