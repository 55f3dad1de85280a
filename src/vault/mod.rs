//! Encrypted OAuth credentials with expiry-aware, auto-refreshing access tokens.
//!
//! Refreshes for one user are serialized behind a per-user lock so a
//! single-use refresh token is never presented twice. A refresh that the
//! provider rejects as an invalid grant deletes the credential; the user has
//! to go through the authorization flow again.

mod cipher;
mod oauth;
mod store;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

pub use cipher::{DecryptionError, EncryptionError, TokenCipher};
pub use oauth::{LinkedInOAuth, OAuthError, TokenEndpoint, TokenResponse};
pub use store::{CredentialStore, PgCredentialStore};

use crate::error::AppError;
use crate::models::credential::{OAuthCredential, SaveCredential};

/// Tokens expiring within this window are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 5 * 60;
/// Lifetime assumed when the provider omits `expires_in` (60 days).
const DEFAULT_LIFETIME_SECS: i64 = 5_184_000;
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No OAuth credential stored for user {0}")]
    NoCredential(i32),

    #[error("Credential for user {0} can no longer be refreshed; re-authentication required")]
    ReauthRequired(i32),

    #[error("Stored credential for user {user_id} cannot be decrypted: {source}")]
    Corrupt {
        user_id: i32,
        #[source]
        source: DecryptionError,
    },

    #[error("Token refresh for user {user_id} failed: {source}")]
    RefreshFailed {
        user_id: i32,
        #[source]
        source: OAuthError,
    },

    #[error("Authorization code exchange failed: {0}")]
    Exchange(#[source] OAuthError),

    #[error("Token encryption failed: {0}")]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl CredentialError {
    /// Whether trying again later may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CredentialError::RefreshFailed { .. } | CredentialError::Storage(_)
        )
    }
}

/// Connection state of a user's credential, without any token material.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub connected: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub has_refresh_token: bool,
}

pub struct CredentialVault {
    cipher: TokenCipher,
    store: Arc<dyn CredentialStore>,
    oauth: Arc<dyn TokenEndpoint>,
    user_locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
    /// Users whose credential was deleted because it could not be refreshed.
    invalidated: Mutex<HashSet<i32>>,
}

impl CredentialVault {
    pub fn new(
        cipher: TokenCipher,
        store: Arc<dyn CredentialStore>,
        oauth: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            cipher,
            store,
            oauth,
            user_locks: Mutex::new(HashMap::new()),
            invalidated: Mutex::new(HashSet::new()),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        self.cipher.encrypt(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptionError> {
        self.cipher.decrypt(ciphertext)
    }

    async fn user_lock(&self, user_id: i32) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }

    /// Delete a credential that can no longer be refreshed. Later lookups
    /// report `ReauthRequired` until the user connects again.
    async fn invalidate(&self, user_id: i32) -> Result<(), CredentialError> {
        self.store.delete(user_id).await?;
        self.invalidated.lock().await.insert(user_id);
        Ok(())
    }

    /// Return a usable access token for `user_id`, refreshing it first when it
    /// is expired or about to expire.
    pub async fn get_valid_access_token(&self, user_id: i32) -> Result<String, CredentialError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let Some(credential) = self.store.find(user_id).await? else {
            if self.invalidated.lock().await.contains(&user_id) {
                return Err(CredentialError::ReauthRequired(user_id));
            }
            return Err(CredentialError::NoCredential(user_id));
        };

        let corrupt = |source| CredentialError::Corrupt { user_id, source };
        let access_token = self.decrypt(&credential.access_token).map_err(corrupt)?;
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .map(|token| self.decrypt(token))
            .transpose()
            .map_err(corrupt)?;

        let now = Utc::now();
        let expired = credential.expires_at.is_none_or(|at| at <= now);
        let expiring_soon = credential
            .expires_at
            .is_some_and(|at| at > now && at - now < Duration::seconds(REFRESH_MARGIN_SECS));

        if !expired && !expiring_soon {
            return Ok(access_token);
        }

        let Some(refresh_token) = refresh_token else {
            tracing::warn!("Token expired and no refresh token available for user {user_id}, deleting credential");
            self.invalidate(user_id).await?;
            return Err(CredentialError::ReauthRequired(user_id));
        };

        tracing::info!(
            "Refreshing access token for user {user_id} (expired: {expired}, expiring soon: {expiring_soon})"
        );

        match self.oauth.refresh(&refresh_token).await {
            Ok(tokens) => {
                let updated = self.persist_refresh(&credential, tokens, now).await?;
                tracing::info!(
                    "Token refreshed for user {user_id}, new expiry: {:?}",
                    updated.0.expires_at
                );
                Ok(updated.1)
            }
            Err(e) if e.is_invalid_grant() => {
                tracing::warn!("Refresh token rejected for user {user_id} ({e}), deleting credential");
                self.invalidate(user_id).await?;
                Err(CredentialError::ReauthRequired(user_id))
            }
            Err(e) => {
                tracing::error!("Transient token refresh failure for user {user_id}: {e}");
                Err(CredentialError::RefreshFailed { user_id, source: e })
            }
        }
    }

    async fn persist_refresh(
        &self,
        previous: &OAuthCredential,
        tokens: TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<(OAuthCredential, String), CredentialError> {
        let access_token = self.encrypt(&tokens.access_token)?;
        // Providers that do not rotate refresh tokens keep the stored one valid.
        let refresh_token = match tokens.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => Some(self.encrypt(token)?),
            _ => previous.refresh_token.clone(),
        };

        let save = SaveCredential {
            user_id: previous.user_id,
            access_token,
            refresh_token,
            expires_at: next_expiry(previous.expires_at, now, tokens.expires_in),
            token_type: tokens
                .token_type
                .unwrap_or_else(|| previous.token_type.clone()),
            scope: tokens.scope.or_else(|| previous.scope.clone()),
        };

        let stored = self.store.update_refreshed(&save).await?;
        Ok((stored, tokens.access_token))
    }

    /// Encrypt and store the tokens of a fresh authorization.
    pub async fn store_tokens(
        &self,
        user_id: i32,
        tokens: TokenResponse,
    ) -> Result<CredentialStatus, CredentialError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let refresh_token = match tokens.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => Some(self.encrypt(token)?),
            _ => None,
        };
        let save = SaveCredential {
            user_id,
            access_token: self.encrypt(&tokens.access_token)?,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(lifetime_secs(tokens.expires_in)),
            token_type: tokens
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            scope: tokens.scope,
        };

        let stored = self.store.save(&save).await?;
        self.invalidated.lock().await.remove(&user_id);
        tracing::info!("Stored OAuth credential for user {user_id}");
        Ok(status_of(Some(&stored)))
    }

    /// Exchange an authorization code and store the resulting tokens.
    pub async fn connect(&self, user_id: i32, code: &str) -> Result<CredentialStatus, CredentialError> {
        let tokens = self
            .oauth
            .exchange_code(code)
            .await
            .map_err(CredentialError::Exchange)?;
        self.store_tokens(user_id, tokens).await
    }

    /// Remove the user's credential. Returns whether one existed.
    pub async fn disconnect(&self, user_id: i32) -> Result<bool, CredentialError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        let removed = self.store.delete(user_id).await?;
        self.invalidated.lock().await.remove(&user_id);
        if removed {
            tracing::info!("Deleted OAuth credential for user {user_id}");
        }
        Ok(removed)
    }

    pub async fn status(&self, user_id: i32) -> Result<CredentialStatus, CredentialError> {
        let credential = self.store.find(user_id).await?;
        Ok(status_of(credential.as_ref()))
    }
}

fn lifetime_secs(expires_in: Option<i64>) -> i64 {
    expires_in
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_LIFETIME_SECS)
}

/// Expiry of a refreshed token, strictly later than the previous one.
fn next_expiry(
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    expires_in: Option<i64>,
) -> DateTime<Utc> {
    let candidate = now + Duration::seconds(lifetime_secs(expires_in));
    match previous {
        Some(prev) if candidate <= prev => prev + Duration::seconds(1),
        _ => candidate,
    }
}

fn status_of(credential: Option<&OAuthCredential>) -> CredentialStatus {
    match credential {
        Some(c) => CredentialStatus {
            connected: true,
            expires_at: c.expires_at,
            scope: c.scope.clone(),
            has_refresh_token: c.refresh_token.is_some(),
        },
        None => CredentialStatus {
            connected: false,
            expires_at: None,
            scope: None,
            has_refresh_token: false,
        },
    }
}
