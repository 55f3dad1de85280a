use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::merge::MergeCounts;
use crate::models::job::Platform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    pub fetched: u32,
    pub new: u32,
    pub updated: u32,
    pub errors: u32,
}

impl PlatformStats {
    pub fn record_merge(&mut self, counts: MergeCounts) {
        self.new += counts.new;
        self.updated += counts.updated;
        self.errors += counts.failed;
    }
}

impl AddAssign for PlatformStats {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.new += other.new;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub pairs: u32,
    pub linkedin: PlatformStats,
    pub indeed: PlatformStats,
    pub total: PlatformStats,
    pub duration_ms: u64,
}

impl SyncStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            pairs: 0,
            linkedin: PlatformStats::default(),
            indeed: PlatformStats::default(),
            total: PlatformStats::default(),
            duration_ms: 0,
        }
    }

    pub fn platform_mut(&mut self, platform: Platform) -> &mut PlatformStats {
        match platform {
            Platform::LinkedIn => &mut self.linkedin,
            Platform::Indeed => &mut self.indeed,
        }
    }

    /// Compute the totals once every pair has been processed.
    pub fn finish(&mut self, duration_ms: u64) {
        let mut total = self.linkedin;
        total += self.indeed;
        self.total = total;
        self.duration_ms = duration_ms;
    }
}
