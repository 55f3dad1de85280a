use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::sync::SyncError;
use crate::vault::CredentialError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Re-authentication required: {0}")]
    ReauthRequired(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Storage(inner) => inner,
            CredentialError::NoCredential(_) | CredentialError::ReauthRequired(_) => {
                AppError::ReauthRequired(err.to_string())
            }
            CredentialError::Corrupt { .. } => AppError::ReauthRequired(err.to_string()),
            CredentialError::Exchange(ref e) if e.is_invalid_grant() => {
                AppError::BadRequest(err.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::AlreadyRunning => AppError::Conflict(err.to_string()),
            SyncError::Storage(inner) => inner,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                if let sqlx::Error::Database(db_err) = e
                    && db_err.is_unique_violation()
                {
                    return (
                        StatusCode::CONFLICT,
                        axum::Json(json!({ "error": "Resource already exists" })),
                    )
                        .into_response();
                }
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::ReauthRequired(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::OAuthError;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn running_sync_maps_to_conflict() {
        assert_eq!(status_of(SyncError::AlreadyRunning.into()), StatusCode::CONFLICT);
    }

    #[test]
    fn credential_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(CredentialError::ReauthRequired(1).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(CredentialError::NoCredential(1).into()),
            StatusCode::UNAUTHORIZED
        );
        let rejected_code = CredentialError::Exchange(OAuthError::Rejected {
            status: 400,
            code: Some("invalid_grant".into()),
            description: None,
        });
        assert_eq!(status_of(rejected_code.into()), StatusCode::BAD_REQUEST);

        let provider_down = CredentialError::RefreshFailed {
            user_id: 1,
            source: OAuthError::Rejected {
                status: 503,
                code: None,
                description: None,
            },
        };
        assert_eq!(status_of(provider_down.into()), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
