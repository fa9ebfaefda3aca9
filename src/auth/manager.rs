//! Token lifecycle against the proxy-manager API.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;

use crate::auth::credential::Credential;
use crate::auth::token::{Token, TokenState};
use crate::error::{ApiError, AuthError};
use crate::npm::{ProxyManagerApi, TokenGrant};

/// Owns the single current token and keeps it usable.
///
/// The slot holds an `Arc<Token>` that is swapped as a whole, so readers
/// see either the old or the new token and never a mix. Concurrent
/// refreshes are not serialized: two callers may both hit the API and the
/// last write wins, which is harmless since every successful exchange
/// yields a usable token.
pub struct CredentialManager {
    api: Arc<dyn ProxyManagerApi>,
    credential: Credential,
    current: RwLock<Option<Arc<Token>>>,
    last_refresh_failed: AtomicBool,
}

impl CredentialManager {
    /// Create a manager.
    ///
    /// With a bootstrap token the token is installed immediately, marked
    /// expired, so the first use refreshes it. With an identity/secret pair
    /// the slot starts empty.
    pub fn new(api: Arc<dyn ProxyManagerApi>, credential: Credential) -> Self {
        let current = match &credential {
            Credential::BootstrapToken(value) => Some(Arc::new(Token::bootstrap(value.clone()))),
            Credential::Password { .. } => None,
        };

        Self {
            api,
            credential,
            current: RwLock::new(current),
            last_refresh_failed: AtomicBool::new(false),
        }
    }

    /// Current token, whatever its age.
    pub async fn current_token(&self) -> Option<Arc<Token>> {
        self.current.read().await.clone()
    }

    pub async fn state(&self) -> TokenState {
        let failed = self.last_refresh_failed.load(Ordering::SeqCst);
        match self.current.read().await.as_ref() {
            Some(token) if token.is_valid() => TokenState::Valid,
            Some(_) if failed => TokenState::Unauthenticated,
            Some(_) => TokenState::Stale,
            None if failed => TokenState::Unauthenticated,
            None => TokenState::Uninitialized,
        }
    }

    /// Return a token that is good for at least the expiry buffer,
    /// refreshing first if needed. Call before every authorized request.
    pub async fn ensure_valid_token(&self) -> Result<Arc<Token>, AuthError> {
        if let Some(token) = self.current.read().await.as_ref()
            && token.is_valid()
        {
            return Ok(Arc::clone(token));
        }

        self.refresh_token().await
    }

    /// Obtain a fresh token.
    ///
    /// Refreshes the current token if there is one. When that fails (or
    /// there is no token yet) and an identity/secret pair is held, a new
    /// token is created instead. On failure the previous token is kept in
    /// the slot; only the reported state changes.
    pub async fn refresh_token(&self) -> Result<Arc<Token>, AuthError> {
        let existing = self.current.read().await.clone();

        let result = match existing {
            Some(token) => match self.api.refresh_token(token.secret()).await {
                Ok(grant) => Ok(grant),
                Err(e) => match &self.credential {
                    Credential::Password { identity, secret } => {
                        tracing::warn!(
                            "Token refresh failed ({}), creating a new token from credentials",
                            e
                        );
                        self.api
                            .create_token(identity, secret)
                            .await
                            .map_err(create_error)
                    }
                    Credential::BootstrapToken(_) => Err(refresh_error(e)),
                },
            },
            None => match &self.credential {
                Credential::Password { identity, secret } => self
                    .api
                    .create_token(identity, secret)
                    .await
                    .map_err(create_error),
                Credential::BootstrapToken(_) => Err(AuthError::Token {
                    reason: "no token available and no credentials to create one".to_string(),
                }),
            },
        };

        match result {
            Ok(grant) => Ok(self.install(grant).await),
            Err(e) => {
                self.last_refresh_failed.store(true, Ordering::SeqCst);
                tracing::error!("Unable to obtain a proxy-manager token: {}", e);
                Err(e)
            }
        }
    }

    async fn install(&self, grant: TokenGrant) -> Arc<Token> {
        let token = Arc::new(Token::new(grant.token, grant.expires));
        *self.current.write().await = Some(Arc::clone(&token));
        self.last_refresh_failed.store(false, Ordering::SeqCst);
        tracing::info!("Proxy-manager token refreshed, expires {}", token.expires());
        token
    }

    /// Refresh on a fixed period until the returned handle is stopped.
    ///
    /// Failures are logged and leave the previous token in place; the next
    /// tick or the next `ensure_valid_token` call tries again.
    pub fn spawn_refresh_task(self: &Arc<Self>, period: Duration) -> RefreshTask {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let manager = Arc::clone(self);

        let handle = tokio::spawn(async move {
            tracing::info!("Starting token refresh loop with interval {:?}", period);

            let mut interval = tokio::time::interval(period);
            // First tick fires immediately; callers refresh on demand.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = manager.refresh_token().await {
                            tracing::warn!("Scheduled token refresh failed: {}", e);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Token refresh loop stopped");
                        break;
                    }
                }
            }
        });

        RefreshTask {
            shutdown_tx,
            handle,
        }
    }
}

/// Handle to the background refresh loop.
pub struct RefreshTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Stop the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Map a failed `POST /api/tokens`.
fn create_error(e: ApiError) -> AuthError {
    match e {
        ApiError::Status { status, body } if status == 401 || status == 403 => {
            AuthError::Authentication {
                reason: format!("credentials rejected (HTTP {status}): {body}"),
            }
        }
        ApiError::Status { status, body } => AuthError::Token {
            reason: format!("token creation rejected (HTTP {status}): {body}"),
        },
        ApiError::InvalidResponse { reason } => AuthError::Token { reason },
        ApiError::NoResponse { reason } => AuthError::Network { reason },
    }
}

/// Map a failed `GET /api/tokens`.
fn refresh_error(e: ApiError) -> AuthError {
    match e {
        ApiError::Status { status, body } => AuthError::Token {
            reason: format!("token refresh rejected (HTTP {status}): {body}"),
        },
        ApiError::InvalidResponse { reason } => AuthError::Token { reason },
        ApiError::NoResponse { reason } => AuthError::Network { reason },
    }
}
