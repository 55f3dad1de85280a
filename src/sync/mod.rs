//! Job synchronization runs: which searches to run, how the results are
//! merged, and when runs are triggered.

mod orchestrator;
pub mod scheduler;
mod stats;

use async_trait::async_trait;
use sqlx::PgPool;

pub use orchestrator::{SyncOrchestrator, SyncSettings};
pub use stats::{PlatformStats, SyncStats};

use crate::error::AppError;
use crate::models::preference::{SearchPair, SearchPreference};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("A job synchronization is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Storage(#[from] AppError),
}

/// Where the per-user search pairs come from.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    async fn search_pairs(&self) -> Result<Vec<SearchPair>, AppError>;
}

#[derive(Debug, Clone)]
pub struct PgPreferenceSource {
    pool: PgPool,
}

impl PgPreferenceSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceSource for PgPreferenceSource {
    async fn search_pairs(&self) -> Result<Vec<SearchPair>, AppError> {
        let prefs = SearchPreference::list_active(&self.pool).await?;
        Ok(prefs.iter().map(SearchPreference::to_pair).collect())
    }
}
