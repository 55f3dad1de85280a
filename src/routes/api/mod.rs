pub mod linkedin;
pub mod sync;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};

use crate::auth::require_api_token;
use crate::routes::AppState;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        // Sync
        .route("/sync/force", post(sync::force))
        .route("/sync/stats", get(sync::stats))
        .route("/sync/cleanup", post(sync::cleanup))
        // LinkedIn connection
        .route("/linkedin/auth-url", get(linkedin::auth_url))
        .route("/linkedin/callback", post(linkedin::callback))
        .route("/linkedin/status/{user_id}", get(linkedin::status))
        .route("/linkedin/{user_id}", delete(linkedin::disconnect))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ))
        .with_state(state);

    Router::new().nest("/api/v1", protected)
}
