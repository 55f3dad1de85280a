use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::collectors::scraper::{self, ScrapeClient, ScrapeRequest};
use crate::collectors::{FetchError, FetchQuery, JobSource};
use crate::models::job::{NewJobPosting, Platform};
use crate::retry::RetryPolicy;

/// Indeed postings. No user credential is involved.
pub struct IndeedSource {
    scraper: Arc<dyn ScrapeClient>,
    retry: RetryPolicy,
}

impl IndeedSource {
    pub fn new(scraper: Arc<dyn ScrapeClient>) -> Self {
        Self {
            scraper,
            retry: RetryPolicy::default().with_jitter(true),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl JobSource for IndeedSource {
    fn platform(&self) -> Platform {
        Platform::Indeed
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<NewJobPosting>, FetchError> {
        let request = ScrapeRequest {
            keywords: &query.keywords,
            location: &query.location,
            limit: query.limit,
            platform: Platform::Indeed,
            period: query.period,
        };
        let request = &request;
        let jobs = self
            .retry
            .execute(|| async move { self.scraper.scrape(request, None).await })
            .await?;

        tracing::info!(
            "Fetched {} Indeed jobs for '{}' in '{}'",
            jobs.len(),
            query.keywords,
            query.location
        );
        Ok(scraper::to_postings(Platform::Indeed, jobs, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::collectors::Period;
    use crate::testing::FakeScrapeClient;

    fn query() -> FetchQuery {
        FetchQuery {
            keywords: "designer".into(),
            location: "Lyon, France".into(),
            limit: 50,
            period: Period::Month,
        }
    }

    #[tokio::test]
    async fn fetches_without_bearer() {
        let scraper = Arc::new(FakeScrapeClient::default());
        scraper.push(Ok(vec![
            json!({ "jobkey": "a1", "title": "UX Designer (CDD)", "location": "Lyon" }),
            json!({ "jobkey": "a2", "title": "Product Designer", "location": "Remote" }),
        ]));
        let source = IndeedSource::new(scraper.clone());

        let postings = source.fetch(&query()).await.unwrap();

        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].external_id, "indeed_a1");
        assert_eq!(postings[0].job_type.as_deref(), Some("CDD"));
        assert!(postings[1].remote);
        assert_eq!(scraper.bearers(), vec![None]);
        assert_eq!(scraper.requests()[0].limit, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let scraper = Arc::new(FakeScrapeClient::default());
        for _ in 0..5 {
            scraper.push(Err(FetchError::Unsuccessful("blocked".into())));
        }
        let source = IndeedSource::new(scraper.clone())
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10)));

        let err = source.fetch(&query()).await.unwrap_err();
        assert!(matches!(err, FetchError::Unsuccessful(_)));
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let scraper = Arc::new(FakeScrapeClient::default());
        scraper.push(Err(FetchError::Status { status: 404, body: "gone".into() }));
        let source = IndeedSource::new(scraper.clone());

        assert!(source.fetch(&query()).await.is_err());
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
    }
}
