use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::error::AppError;
use crate::merge::CleanupReport;
use crate::routes::AppState;
use crate::sync::SyncStats;

#[derive(Debug, Default, Deserialize)]
pub struct ForceSyncRequest {
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    /// Soft-delete threshold in days
    #[serde(default)]
    pub days_old: Option<u32>,
    #[serde(default)]
    pub hard_delete_days: Option<u32>,
}

pub async fn force(
    State(state): State<AppState>,
    Json(input): Json<ForceSyncRequest>,
) -> Result<Json<SyncStats>, AppError> {
    let stats = state
        .orchestrator
        .force_sync(input.keywords, input.location)
        .await?;
    Ok(Json(stats))
}

pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.orchestrator.last_sync_stats().await {
        Some(stats) => Json(serde_json::json!({
            "running": state.orchestrator.is_running(),
            "stats": stats,
        })),
        None => Json(serde_json::json!({
            "running": state.orchestrator.is_running(),
            "message": "No sync has completed yet",
        })),
    }
}

pub async fn cleanup(
    State(state): State<AppState>,
    Json(input): Json<CleanupRequest>,
) -> Result<Json<CleanupReport>, AppError> {
    let soft_days = input.days_old.unwrap_or(state.soft_delete_days);
    let hard_days = input.hard_delete_days.unwrap_or(state.hard_delete_days);
    if soft_days == 0 || hard_days == 0 {
        return Err(AppError::BadRequest(
            "Cleanup thresholds must be at least one day".to_string(),
        ));
    }

    let report = state
        .orchestrator
        .cleanup_old_postings(soft_days, hard_days)
        .await?;
    Ok(Json(report))
}
