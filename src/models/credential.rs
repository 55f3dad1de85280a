use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;

/// Stored OAuth credential. Both token columns hold ciphertext produced by
/// [`TokenCipher`](crate::vault::TokenCipher), never plaintext.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OAuthCredential {
    pub id: i32,
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SaveCredential {
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthCredential {
    pub async fn find_by_user(pool: &PgPool, user_id: i32) -> Result<Option<OAuthCredential>, AppError> {
        let credential =
            sqlx::query_as::<_, OAuthCredential>("SELECT * FROM oauth_credentials WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(credential)
    }

    /// Store the result of an authorization-code exchange, replacing any previous row.
    pub async fn upsert(pool: &PgPool, input: &SaveCredential) -> Result<OAuthCredential, AppError> {
        let credential = sqlx::query_as::<_, OAuthCredential>(
            "INSERT INTO oauth_credentials (user_id, access_token, refresh_token, expires_at, token_type, scope)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO UPDATE SET
                 access_token = EXCLUDED.access_token,
                 refresh_token = EXCLUDED.refresh_token,
                 expires_at = EXCLUDED.expires_at,
                 token_type = EXCLUDED.token_type,
                 scope = EXCLUDED.scope,
                 updated_at = NOW()
             RETURNING *",
        )
        .bind(input.user_id)
        .bind(&input.access_token)
        .bind(&input.refresh_token)
        .bind(input.expires_at)
        .bind(&input.token_type)
        .bind(&input.scope)
        .fetch_one(pool)
        .await?;
        Ok(credential)
    }

    /// Persist refreshed tokens. The update only applies when it moves
    /// `expires_at` forward, so a stale writer can never roll the expiry back.
    pub async fn update_refreshed(
        pool: &PgPool,
        input: &SaveCredential,
    ) -> Result<OAuthCredential, AppError> {
        sqlx::query_as::<_, OAuthCredential>(
            "UPDATE oauth_credentials
             SET access_token = $2, refresh_token = $3, expires_at = $4, token_type = $5, scope = $6, updated_at = NOW()
             WHERE user_id = $1 AND (expires_at IS NULL OR expires_at < $4)
             RETURNING *",
        )
        .bind(input.user_id)
        .bind(&input.access_token)
        .bind(&input.refresh_token)
        .bind(input.expires_at)
        .bind(&input.token_type)
        .bind(&input.scope)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "Credential for user {} was removed or refreshed concurrently",
                input.user_id
            ))
        })
    }

    pub async fn delete(pool: &PgPool, user_id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM oauth_credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
