//! Periodic sync and cleanup, driven by tokio-cron-scheduler.
//!
//! Both jobs enter the same [`SyncOrchestrator`]: a sync tick that fires while
//! a run (scheduled or forced) is still active is skipped.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::sync::SyncOrchestrator;

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub sync_cron: String,
    pub cleanup_cron: String,
    pub soft_delete_days: u32,
    pub hard_delete_days: u32,
}

/// Accept classic 5-field expressions by prepending a seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

pub async fn start_scheduler(
    orchestrator: Arc<SyncOrchestrator>,
    config: ScheduleConfig,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sync_cron = normalize_cron(&config.sync_cron);
    let sync_orchestrator = orchestrator.clone();
    let sync_job = Job::new_async(sync_cron.as_str(), move |_uuid, _lock| {
        let orchestrator = sync_orchestrator.clone();
        Box::pin(async move {
            tracing::info!("Starting scheduled job sync");
            orchestrator.run_scheduled().await;
        })
    })?;
    scheduler.add(sync_job).await?;

    let cleanup_cron = normalize_cron(&config.cleanup_cron);
    let (soft_days, hard_days) = (config.soft_delete_days, config.hard_delete_days);
    let cleanup_job = Job::new_async(cleanup_cron.as_str(), move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            if let Err(e) = orchestrator.cleanup_old_postings(soft_days, hard_days).await {
                tracing::error!("Scheduled cleanup failed: {e}");
            }
        })
    })?;
    scheduler.add(cleanup_job).await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started (sync: '{sync_cron}', cleanup: '{cleanup_cron}')");
    Ok(scheduler)
}
