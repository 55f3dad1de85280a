// Job sources. Each platform is its own failure domain: a source that keeps
// failing after its retries is counted as an error for that platform only.

pub mod indeed;
pub mod linkedin;
pub mod scraper;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::job::{NewJobPosting, Platform};
use crate::retry::Retryable;
use crate::vault::CredentialError;

pub use indeed::IndeedSource;
pub use linkedin::LinkedInSource;
pub use scraper::{HttpScrapeClient, ScrapeClient, ScrapeRequest};

/// How far back postings are searched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[default]
    #[serde(rename = "month")]
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "24h",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" | "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(format!("unknown period '{other}' (expected 24h, week or month)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub keywords: String,
    pub location: String,
    pub limit: u32,
    pub period: Period,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("scrape service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("scrape request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scrape service reported a failure: {0}")]
    Unsuccessful(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl Retryable for FetchError {
    fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            FetchError::Unsuccessful(_) | FetchError::Credential(_) => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            // A token can become refreshable again; a missing or dead grant cannot.
            FetchError::Credential(e) => e.is_transient(),
            _ => !matches!(self.status_code(), Some(401 | 403 | 404)),
        }
    }
}

/// A platform that job postings are fetched from.
#[async_trait]
pub trait JobSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch postings matching `query`. An empty list is a valid result.
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<NewJobPosting>, FetchError>;
}
