use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::collectors::scraper::{self, ScrapeClient, ScrapeRequest};
use crate::collectors::{FetchError, FetchQuery, JobSource};
use crate::models::job::{NewJobPosting, Platform};
use crate::retry::RetryPolicy;
use crate::vault::CredentialVault;

/// LinkedIn postings, fetched on behalf of one user whose OAuth token is
/// forwarded to the scrape service.
pub struct LinkedInSource {
    scraper: Arc<dyn ScrapeClient>,
    vault: Arc<CredentialVault>,
    user_id: i32,
    retry: RetryPolicy,
}

impl LinkedInSource {
    pub fn new(scraper: Arc<dyn ScrapeClient>, vault: Arc<CredentialVault>, user_id: i32) -> Self {
        Self {
            scraper,
            vault,
            user_id,
            retry: RetryPolicy::default().with_jitter(true),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl JobSource for LinkedInSource {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<NewJobPosting>, FetchError> {
        let jobs = self
            .retry
            .execute(|| async move {
                // Fetched per attempt: a retry may come after the token was refreshed.
                let token = self.vault.get_valid_access_token(self.user_id).await?;
                let request = ScrapeRequest {
                    keywords: &query.keywords,
                    location: &query.location,
                    limit: query.limit,
                    platform: Platform::LinkedIn,
                    period: query.period,
                };
                self.scraper.scrape(&request, Some(&token)).await
            })
            .await?;

        tracing::info!(
            "Fetched {} LinkedIn jobs for '{}' in '{}'",
            jobs.len(),
            query.keywords,
            query.location
        );
        Ok(scraper::to_postings(Platform::LinkedIn, jobs, Utc::now()))
    }
}
