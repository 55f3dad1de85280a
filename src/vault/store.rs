use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::credential::{OAuthCredential, SaveCredential};

/// Persistence of encrypted OAuth credentials, one row per user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, user_id: i32) -> Result<Option<OAuthCredential>, AppError>;

    /// Insert or replace the user's credential.
    async fn save(&self, credential: &SaveCredential) -> Result<OAuthCredential, AppError>;

    /// Store refreshed tokens; must reject an expiry that does not move forward.
    async fn update_refreshed(&self, credential: &SaveCredential) -> Result<OAuthCredential, AppError>;

    async fn delete(&self, user_id: i32) -> Result<bool, AppError>;
}

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find(&self, user_id: i32) -> Result<Option<OAuthCredential>, AppError> {
        OAuthCredential::find_by_user(&self.pool, user_id).await
    }

    async fn save(&self, credential: &SaveCredential) -> Result<OAuthCredential, AppError> {
        OAuthCredential::upsert(&self.pool, credential).await
    }

    async fn update_refreshed(&self, credential: &SaveCredential) -> Result<OAuthCredential, AppError> {
        OAuthCredential::update_refreshed(&self.pool, credential).await
    }

    async fn delete(&self, user_id: i32) -> Result<bool, AppError> {
        OAuthCredential::delete(&self.pool, user_id).await
    }
}
