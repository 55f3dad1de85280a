use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::error::AppError;

/// External job platform a posting was fetched from.
///
/// LinkedIn is the primary (authenticated) source, Indeed the secondary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Indeed,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Indeed => "indeed",
        }
    }

    /// Namespace a platform-local identifier so it is unique across platforms.
    pub fn external_id(&self, raw_id: &str) -> String {
        let prefix = format!("{}_", self.as_str());
        if raw_id.starts_with(&prefix) {
            raw_id.to_string()
        } else {
            format!("{prefix}{raw_id}")
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linkedin" => Ok(Platform::LinkedIn),
            "indeed" => Ok(Platform::Indeed),
            other => Err(AppError::BadRequest(format!("Unknown platform '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct JobPosting {
    pub id: i32,
    pub external_id: String,
    pub platform: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub skills: Vec<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub salary_currency: Option<String>,
    pub job_type: Option<String>,
    pub remote: bool,
    pub url: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
    pub raw_data: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A posting as produced by a source, before it is merged into the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJobPosting {
    pub external_id: String,
    pub platform: Platform,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub skills: Vec<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub salary_currency: Option<String>,
    pub job_type: Option<String>,
    pub remote: bool,
    pub url: Option<String>,
    pub posted_date: DateTime<Utc>,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    job: JobPosting,
    inserted: bool,
}

impl JobPosting {
    /// Insert or update by `external_id`. Returns the row and whether it was inserted.
    ///
    /// On conflict only the mutable fields are overwritten; `external_id`,
    /// `platform` and `created_at` keep their first-seen values.
    pub async fn upsert<'e, E>(executor: E, input: &NewJobPosting) -> Result<(JobPosting, bool), AppError>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, UpsertRow>(
            "INSERT INTO job_postings (external_id, platform, title, company, location, description, requirements, skills, salary_min, salary_max, salary_currency, job_type, remote, url, posted_date, raw_data)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (external_id) DO UPDATE SET
                 title = EXCLUDED.title,
                 company = EXCLUDED.company,
                 location = EXCLUDED.location,
                 description = EXCLUDED.description,
                 requirements = EXCLUDED.requirements,
                 skills = EXCLUDED.skills,
                 salary_min = EXCLUDED.salary_min,
                 salary_max = EXCLUDED.salary_max,
                 salary_currency = EXCLUDED.salary_currency,
                 raw_data = EXCLUDED.raw_data,
                 updated_at = NOW()
             RETURNING *, (xmax = 0) AS inserted",
        )
        .bind(&input.external_id)
        .bind(input.platform.as_str())
        .bind(&input.title)
        .bind(&input.company)
        .bind(&input.location)
        .bind(&input.description)
        .bind(&input.requirements)
        .bind(&input.skills)
        .bind(input.salary_min)
        .bind(input.salary_max)
        .bind(&input.salary_currency)
        .bind(&input.job_type)
        .bind(input.remote)
        .bind(&input.url)
        .bind(input.posted_date)
        .bind(&input.raw_data)
        .fetch_one(executor)
        .await?;
        Ok((row.job, row.inserted))
    }

    /// Soft-delete active postings published before `cutoff`.
    pub async fn deactivate_posted_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE job_postings SET is_active = FALSE, updated_at = NOW() WHERE posted_date < $1 AND is_active",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Permanently remove inactive postings published before `cutoff`.
    pub async fn purge_inactive_posted_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM job_postings WHERE posted_date < $1 AND NOT is_active")
                .bind(cutoff)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
