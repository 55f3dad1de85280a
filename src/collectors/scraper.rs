use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collectors::{FetchError, Period};
use crate::models::job::{NewJobPosting, Platform};

/// Scraping can take a while for large result sets.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRequest<'a> {
    pub keywords: &'a str,
    pub location: &'a str,
    pub limit: u32,
    pub platform: Platform,
    pub period: Period,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    jobs: Vec<Value>,
    error: Option<String>,
}

/// The external scrape/fetch service, treated as a black box.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    /// Raw job objects for `request`. `bearer` is forwarded for platforms that
    /// need the user's access token.
    async fn scrape(
        &self,
        request: &ScrapeRequest<'_>,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, FetchError>;
}

/// Client of the scrape service's `POST /scrape-jobs` endpoint.
#[derive(Debug, Clone)]
pub struct HttpScrapeClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScrapeClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ScrapeClient for HttpScrapeClient {
    async fn scrape(
        &self,
        request: &ScrapeRequest<'_>,
        bearer: Option<&str>,
    ) -> Result<Vec<Value>, FetchError> {
        let mut builder = self
            .client
            .post(format!("{}/scrape-jobs", self.base_url))
            .timeout(SCRAPE_TIMEOUT)
            .json(request);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: ScrapeResponse = resp.json().await?;
        if !data.success {
            return Err(FetchError::Unsuccessful(
                data.error.unwrap_or_else(|| "success=false".to_string()),
            ));
        }
        Ok(data.jobs)
    }
}

/// Job object as returned by the scrape service. Everything but the id is optional.
#[derive(Debug, Deserialize)]
struct ScrapedJob {
    #[serde(alias = "id", alias = "jobkey")]
    external_id: Option<String>,
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    description: Option<String>,
    requirements: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    salary_currency: Option<String>,
    job_type: Option<String>,
    remote: Option<bool>,
    url: Option<String>,
    posted_date: Option<String>,
    raw_data: Option<Value>,
}

/// Convert raw scrape results into postings for `platform`.
///
/// Entries without an identifier are dropped since they cannot be merged.
pub fn to_postings(platform: Platform, jobs: Vec<Value>, fetched_at: DateTime<Utc>) -> Vec<NewJobPosting> {
    let total = jobs.len();
    let postings: Vec<NewJobPosting> = jobs
        .into_iter()
        .filter_map(|raw| to_posting(platform, raw, fetched_at))
        .collect();

    if postings.len() < total {
        tracing::warn!(
            "Dropped {} {platform} results without a usable identifier",
            total - postings.len()
        );
    }
    postings
}

fn to_posting(platform: Platform, raw: Value, fetched_at: DateTime<Utc>) -> Option<NewJobPosting> {
    let job: ScrapedJob = match serde_json::from_value(raw.clone()) {
        Ok(job) => job,
        Err(e) => {
            tracing::debug!("Skipping malformed {platform} result: {e}");
            return None;
        }
    };

    let raw_id = job.external_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
    let title = job.title.unwrap_or_default();
    let description = job.description.filter(|d| !d.is_empty());
    let requirements = job
        .requirements
        .filter(|r| !r.is_empty())
        .or_else(|| description.clone());

    let text = description.as_deref().unwrap_or_default();
    let job_type = job
        .job_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| infer_job_type(&title, text).to_string());
    let remote = job
        .remote
        .unwrap_or_else(|| infer_remote(&title, text, job.location.as_deref().unwrap_or_default()));

    Some(NewJobPosting {
        external_id: platform.external_id(raw_id),
        platform,
        title,
        company: job.company.unwrap_or_default(),
        location: job.location,
        description,
        requirements,
        skills: Vec::new(),
        salary_min: job.salary_min.map(|v| v as i32),
        salary_max: job.salary_max.map(|v| v as i32),
        salary_currency: job.salary_currency,
        job_type: Some(job_type),
        remote,
        url: job.url,
        posted_date: job
            .posted_date
            .as_deref()
            .and_then(parse_posted_date)
            .unwrap_or(fetched_at),
        raw_data: job.raw_data.or(Some(raw)),
    })
}

fn parse_posted_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Timestamps without an offset are taken as UTC.
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Contract type guessed from the title and description.
pub fn infer_job_type(title: &str, description: &str) -> &'static str {
    let text = format!("{title} {description}").to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["cdi", "permanent", "full-time"]) {
        "CDI"
    } else if has(&["cdd", "contract", "temporary"]) {
        "CDD"
    } else if has(&["stage", "internship", "intern"]) {
        "Stage"
    } else if has(&["freelance", "consultant"]) {
        "Freelance"
    } else if has(&["alternance", "apprenticeship"]) {
        "Alternance"
    } else {
        "Non spécifié"
    }
}

pub fn infer_remote(title: &str, description: &str, location: &str) -> bool {
    let text = format!("{title} {description} {location}").to_lowercase();
    ["remote", "télétravail", "telework", "work from home", "wfh"]
        .iter()
        .any(|w| text.contains(w))
}
