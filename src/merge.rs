//! Merging fetched postings into the job store, keyed by `external_id`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::job::{JobPosting, NewJobPosting};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    fn from_inserted(inserted: bool) -> Self {
        if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        }
    }
}

/// Storage of job postings. Only the merger talks to it.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn upsert(&self, posting: &NewJobPosting) -> Result<UpsertOutcome, AppError>;

    /// Upsert all postings in one transaction: either every row is written or none.
    async fn upsert_batch(&self, postings: &[NewJobPosting]) -> Result<Vec<UpsertOutcome>, AppError>;

    async fn deactivate_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;

    async fn purge_inactive_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn upsert(&self, posting: &NewJobPosting) -> Result<UpsertOutcome, AppError> {
        let (_, inserted) = JobPosting::upsert(&self.pool, posting).await?;
        Ok(UpsertOutcome::from_inserted(inserted))
    }

    async fn upsert_batch(&self, postings: &[NewJobPosting]) -> Result<Vec<UpsertOutcome>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(postings.len());
        for posting in postings {
            let (_, inserted) = JobPosting::upsert(&mut *tx, posting).await?;
            outcomes.push(UpsertOutcome::from_inserted(inserted));
        }
        tx.commit().await?;
        Ok(outcomes)
    }

    async fn deactivate_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        JobPosting::deactivate_posted_before(&self.pool, cutoff).await
    }

    async fn purge_inactive_posted_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        JobPosting::purge_inactive_posted_before(&self.pool, cutoff).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeCounts {
    pub new: u32,
    pub updated: u32,
    /// Postings that could not be written and were skipped.
    pub failed: u32,
}

impl MergeCounts {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.new += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub soft_deleted: u64,
    pub hard_deleted: u64,
}

pub struct PersistenceMerger {
    store: Arc<dyn JobStore>,
}

impl PersistenceMerger {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Upsert postings one by one. A posting that fails is logged and skipped.
    pub async fn upsert(&self, postings: &[NewJobPosting]) -> MergeCounts {
        let mut counts = MergeCounts::default();
        for posting in postings {
            match self.store.upsert(posting).await {
                Ok(outcome) => {
                    tracing::debug!("Upserted {} ({outcome:?})", posting.external_id);
                    counts.record(outcome);
                }
                Err(e) => {
                    tracing::error!("Failed to upsert {}: {e}", posting.external_id);
                    counts.failed += 1;
                }
            }
        }
        counts
    }

    /// Upsert postings atomically; on error nothing from the batch is kept.
    pub async fn bulk_upsert(&self, postings: &[NewJobPosting]) -> Result<MergeCounts, AppError> {
        if postings.is_empty() {
            return Ok(MergeCounts::default());
        }
        let outcomes = self.store.upsert_batch(postings).await?;
        let mut counts = MergeCounts::default();
        for outcome in outcomes {
            counts.record(outcome);
        }
        Ok(counts)
    }

    /// Soft-delete postings published before `soft_cutoff`, then hard-delete
    /// inactive ones published before `hard_cutoff`.
    pub async fn cleanup(
        &self,
        soft_cutoff: DateTime<Utc>,
        hard_cutoff: DateTime<Utc>,
    ) -> Result<CleanupReport, AppError> {
        let soft_deleted = self.store.deactivate_posted_before(soft_cutoff).await?;
        let hard_deleted = self.store.purge_inactive_posted_before(hard_cutoff).await?;
        Ok(CleanupReport {
            soft_deleted,
            hard_deleted,
        })
    }
}
