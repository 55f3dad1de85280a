use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::collectors::{FetchQuery, JobSource, Period};
use crate::merge::{CleanupReport, PersistenceMerger};
use crate::models::job::NewJobPosting;
use crate::models::preference::SearchPair;
use crate::skills::extract_skills;
use crate::sync::{PreferenceSource, SyncError, SyncStats};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Searched (crossed with `default_locations`) when no user has preferences.
    pub default_keywords: Vec<String>,
    pub default_locations: Vec<String>,
    pub fetch_limit: u32,
    pub period: Period,
    /// Pause between two pairs, to stay under the platforms' rate limits.
    pub pair_delay: Duration,
    /// Merge each platform batch in one transaction instead of posting by posting.
    pub atomic_merge: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_keywords: ["developer", "engineer", "designer", "manager"]
                .map(String::from)
                .to_vec(),
            default_locations: ["Paris, France", "Lyon, France", "Marseille, France"]
                .map(String::from)
                .to_vec(),
            fetch_limit: 50,
            period: Period::Month,
            pair_delay: Duration::from_secs(2),
            atomic_merge: false,
        }
    }
}

/// Releases the single-flight flag when dropped, including on unwind.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives synchronization runs. At most one run is active at a time.
pub struct SyncOrchestrator {
    sources: Vec<Arc<dyn JobSource>>,
    merger: PersistenceMerger,
    preferences: Arc<dyn PreferenceSource>,
    settings: SyncSettings,
    running: AtomicBool,
    last_stats: RwLock<Option<SyncStats>>,
}

impl SyncOrchestrator {
    pub fn new(
        sources: Vec<Arc<dyn JobSource>>,
        merger: PersistenceMerger,
        preferences: Arc<dyn PreferenceSource>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            sources,
            merger,
            preferences,
            settings,
            running: AtomicBool::new(false),
            last_stats: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_start(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// Scheduled trigger: skips (returns `None`) when a run is already active.
    pub async fn run_scheduled(&self) -> Option<SyncStats> {
        let Some(_guard) = self.try_start() else {
            tracing::warn!("Job sync already running, skipping scheduled run");
            return None;
        };

        match self.full_run().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::error!("Scheduled job sync failed: {e}");
                None
            }
        }
    }

    /// Manual trigger. With both `keywords` and `location` only that pair is
    /// synced; otherwise a full run is performed.
    pub async fn force_sync(
        &self,
        keywords: Option<String>,
        location: Option<String>,
    ) -> Result<SyncStats, SyncError> {
        let _guard = self.try_start().ok_or(SyncError::AlreadyRunning)?;

        let keywords = keywords.filter(|k| !k.trim().is_empty());
        let location = location.filter(|l| !l.trim().is_empty());
        match (keywords, location) {
            (Some(keywords), Some(location)) => {
                tracing::info!("Forced job sync for '{keywords}' in '{location}'");
                Ok(self.run(vec![SearchPair::new(keywords, location)]).await)
            }
            _ => {
                tracing::info!("Forced full job sync");
                self.full_run().await
            }
        }
    }

    pub async fn last_sync_stats(&self) -> Option<SyncStats> {
        self.last_stats.read().await.clone()
    }

    /// Soft-delete postings older than `soft_days`, then hard-delete inactive
    /// postings older than `hard_days`.
    pub async fn cleanup_old_postings(
        &self,
        soft_days: u32,
        hard_days: u32,
    ) -> Result<CleanupReport, SyncError> {
        let now = Utc::now();
        let soft_cutoff = now - chrono::Duration::days(i64::from(soft_days));
        let hard_cutoff = now - chrono::Duration::days(i64::from(hard_days));

        let report = self.merger.cleanup(soft_cutoff, hard_cutoff).await?;
        tracing::info!(
            "Cleanup: {} postings deactivated (older than {soft_days} days), {} deleted (older than {hard_days} days)",
            report.soft_deleted,
            report.hard_deleted
        );
        Ok(report)
    }

    async fn full_run(&self) -> Result<SyncStats, SyncError> {
        let pairs = self.search_pairs().await?;
        Ok(self.run(pairs).await)
    }

    /// Pairs from user preferences, or the configured defaults when there are none.
    async fn search_pairs(&self) -> Result<Vec<SearchPair>, SyncError> {
        let mut pairs: Vec<SearchPair> = Vec::new();
        for pair in self.preferences.search_pairs().await? {
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }

        if pairs.is_empty() {
            tracing::info!("No user preferences found, using default search pairs");
            pairs = self
                .settings
                .default_keywords
                .iter()
                .flat_map(|keywords| {
                    self.settings
                        .default_locations
                        .iter()
                        .map(move |location| SearchPair::new(keywords.as_str(), location.as_str()))
                })
                .collect();
        }
        Ok(pairs)
    }

    async fn run(&self, pairs: Vec<SearchPair>) -> SyncStats {
        let clock = Instant::now();
        let mut stats = SyncStats::new(Utc::now());
        tracing::info!("Job sync {} started with {} search pairs", stats.run_id, pairs.len());

        for (i, pair) in pairs.iter().enumerate() {
            if i > 0 && !self.settings.pair_delay.is_zero() {
                tokio::time::sleep(self.settings.pair_delay).await;
            }
            self.sync_pair(pair, &mut stats).await;
            stats.pairs += 1;
        }

        stats.finish(clock.elapsed().as_millis() as u64);
        tracing::info!(
            "Job sync {} completed in {}ms: {} fetched, {} new, {} updated, {} errors",
            stats.run_id,
            stats.duration_ms,
            stats.total.fetched,
            stats.total.new,
            stats.total.updated,
            stats.total.errors
        );

        *self.last_stats.write().await = Some(stats.clone());
        stats
    }

    async fn sync_pair(&self, pair: &SearchPair, stats: &mut SyncStats) {
        let query = FetchQuery {
            keywords: pair.keywords.clone(),
            location: pair.location.clone(),
            limit: self.settings.fetch_limit,
            period: self.settings.period,
        };

        // Platforms are independent; fetch them concurrently and merge each
        // result as its own batch.
        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = source.clone();
                let query = query.clone();
                let platform = source.platform();
                (platform, tokio::spawn(async move { source.fetch(&query).await }))
            })
            .collect();

        for (platform, handle) in handles {
            let result = match handle.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => Err(format!("fetch task aborted: {e}")),
            };

            let postings = match result {
                Ok(postings) => postings,
                Err(e) => {
                    tracing::error!(
                        "Error syncing {platform} for '{}' in '{}': {e}",
                        pair.keywords,
                        pair.location
                    );
                    stats.platform_mut(platform).errors += 1;
                    continue;
                }
            };

            stats.platform_mut(platform).fetched += postings.len() as u32;
            let postings = with_skills(postings);

            if self.settings.atomic_merge {
                match self.merger.bulk_upsert(&postings).await {
                    Ok(counts) => stats.platform_mut(platform).record_merge(counts),
                    Err(e) => {
                        tracing::error!("Batch merge of {} {platform} postings rolled back: {e}", postings.len());
                        stats.platform_mut(platform).errors += 1;
                    }
                }
            } else {
                let counts = self.merger.upsert(&postings).await;
                stats.platform_mut(platform).record_merge(counts);
            }
        }
    }
}

fn with_skills(mut postings: Vec<NewJobPosting>) -> Vec<NewJobPosting> {
    for posting in &mut postings {
        posting.skills = extract_skills(
            posting.description.as_deref().unwrap_or_default(),
            posting.requirements.as_deref().unwrap_or_default(),
        );
    }
    postings
}
