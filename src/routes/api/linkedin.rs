use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use crate::auth::generate_token;
use crate::error::AppError;
use crate::routes::AppState;
use crate::vault::CredentialStatus;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub user_id: i32,
    pub code: String,
}

pub async fn auth_url(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let oauth_state = generate_token();
    let url = state
        .oauth
        .authorization_url(&oauth_state)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "url": url,
        "state": oauth_state,
    })))
}

pub async fn callback(
    State(state): State<AppState>,
    Json(input): Json<CallbackRequest>,
) -> Result<Json<CredentialStatus>, AppError> {
    if input.code.trim().is_empty() {
        return Err(AppError::BadRequest("Authorization code is required".to_string()));
    }
    let status = state.vault.connect(input.user_id, &input.code).await?;
    Ok(Json(status))
}

pub async fn status(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<CredentialStatus>, AppError> {
    let status = state.vault.status(user_id).await?;
    Ok(Json(status))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.vault.disconnect(user_id).await? {
        return Err(AppError::NotFound(format!(
            "No LinkedIn connection for user {user_id}"
        )));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
