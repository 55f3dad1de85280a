use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;

const FALLBACK_KEYWORDS: &str = "developer";
const FALLBACK_LOCATION: &str = "Paris, France";

/// A (keywords, location) combination to search on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchPair {
    pub keywords: String,
    pub location: String,
}

impl SearchPair {
    pub fn new(keywords: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location: location.into(),
        }
    }
}

/// Search preferences of an active user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchPreference {
    pub user_id: i32,
    pub job_keywords: Option<Vec<String>>,
    pub locations: Option<Vec<String>>,
}

impl SearchPreference {
    pub async fn list_active(pool: &PgPool) -> Result<Vec<SearchPreference>, AppError> {
        let prefs = sqlx::query_as::<_, SearchPreference>(
            "SELECT up.user_id, up.job_keywords, up.locations
             FROM user_preferences up
             JOIN users u ON up.user_id = u.id
             WHERE u.is_active = TRUE
             ORDER BY up.user_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(prefs)
    }

    /// Keywords joined with spaces and the first location, with fallbacks for blanks.
    pub fn to_pair(&self) -> SearchPair {
        let keywords = self
            .job_keywords
            .as_deref()
            .map(|k| {
                k.iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| FALLBACK_KEYWORDS.to_string());

        let location = self
            .locations
            .as_deref()
            .and_then(|l| l.iter().map(|s| s.trim()).find(|s| !s.is_empty()))
            .unwrap_or(FALLBACK_LOCATION)
            .to_string();

        SearchPair { keywords, location }
    }
}
