//! Wire types for the proxy-manager API.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::selector::ForwardScheme;

/// A token issued by the proxy manager.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub token: SecretString,
    pub expires: DateTime<Utc>,
}

/// `{token, expires}` as it appears on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(resp: TokenResponse) -> Self {
        Self {
            token: SecretString::from(resp.token),
            expires: resp.expires,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub identity: &'a str,
    pub secret: &'a str,
}

/// Status and body of an API call that did get an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Everything needed to create one proxy host. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHostRequest {
    pub domain_name: String,
    pub forward_scheme: ForwardScheme,
    pub forward_host: String,
    pub forward_port: u16,
    pub certificate_id: u64,
}

impl ProxyHostRequest {
    /// JSON body for `POST /api/nginx/proxy-hosts`.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "domain_names": [self.domain_name],
            "forward_scheme": self.forward_scheme,
            "forward_host": self.forward_host,
            "forward_port": self.forward_port,
            "certificate_id": self.certificate_id,
            "block_exploits": "true",
            "caching_enabled": "true",
            "http2_support": "true",
            "enabled": "true",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn proxy_host_body_matches_api_shape() {
        let request = ProxyHostRequest {
            domain_name: "radarr.example.com".to_string(),
            forward_scheme: ForwardScheme::Http,
            forward_host: "radarr.ix-radarr.svc.cluster.local".to_string(),
            forward_port: 7878,
            certificate_id: 3,
        };

        assert_eq!(
            request.to_body(),
            serde_json::json!({
                "domain_names": ["radarr.example.com"],
                "forward_scheme": "http",
                "forward_host": "radarr.ix-radarr.svc.cluster.local",
                "forward_port": 7878,
                "certificate_id": 3,
                "block_exploits": "true",
                "caching_enabled": "true",
                "http2_support": "true",
                "enabled": "true",
            })
        );
    }

    #[test]
    fn token_response_parses_npm_timestamp() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"token":"eyJhbGciOiJSUzI1NiJ9.x.y","expires":"2026-10-17T08:00:00.000Z"}"#,
        )
        .unwrap();
        let grant = TokenGrant::from(resp);
        assert_eq!(grant.expires.to_rfc3339(), "2026-10-17T08:00:00+00:00");
    }
}
