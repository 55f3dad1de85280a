use std::time::Duration;

use clap::Parser;

use crate::collectors::Period;
use crate::retry::RetryPolicy;
use crate::sync::SyncSettings;
use crate::sync::scheduler::ScheduleConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobsync", about = "Job posting synchronization engine")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Master secret the token encryption key is derived from
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: String,

    /// Base URL of the scrape service
    #[arg(long, env = "SCRAPER_URL", default_value = "http://127.0.0.1:5001")]
    pub scraper_url: String,

    #[arg(long, env = "LINKEDIN_CLIENT_ID", default_value = "")]
    pub linkedin_client_id: String,

    #[arg(long, env = "LINKEDIN_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub linkedin_client_secret: String,

    #[arg(
        long,
        env = "LINKEDIN_REDIRECT_URI",
        default_value = "http://localhost:5173/auth/linkedin/callback"
    )]
    pub linkedin_redirect_uri: String,

    /// User whose LinkedIn credential is used for syncing
    #[arg(long, env = "SYNC_USER_ID", default_value = "0")]
    pub sync_user_id: i32,

    /// Keywords searched when no user has stored preferences
    #[arg(
        long,
        env = "DEFAULT_KEYWORDS",
        value_delimiter = ',',
        default_value = "developer,engineer,designer,manager"
    )]
    pub default_keywords: Vec<String>,

    /// Locations searched when no user has stored preferences
    #[arg(
        long,
        env = "DEFAULT_LOCATIONS",
        value_delimiter = ';',
        default_value = "Paris, France;Lyon, France;Marseille, France"
    )]
    pub default_locations: Vec<String>,

    /// Maximum postings requested per platform and pair
    #[arg(long, env = "FETCH_LIMIT", default_value = "50")]
    pub fetch_limit: u32,

    /// Search window: 24h, week or month
    #[arg(long, env = "FETCH_PERIOD", default_value = "month")]
    pub fetch_period: Period,

    /// Attempts per platform fetch, including the first one
    #[arg(long, env = "FETCH_MAX_ATTEMPTS", default_value = "3")]
    pub fetch_max_attempts: u32,

    /// Delay between two search pairs, in milliseconds
    #[arg(long, env = "PAIR_DELAY_MS", default_value = "2000")]
    pub pair_delay_ms: u64,

    /// Merge each platform batch in a single transaction
    #[arg(long, env = "ATOMIC_MERGE", default_value = "false")]
    pub atomic_merge: bool,

    /// Postings older than this many days are deactivated
    #[arg(long, env = "SOFT_DELETE_DAYS", default_value = "30")]
    pub soft_delete_days: u32,

    /// Inactive postings older than this many days are deleted
    #[arg(long, env = "HARD_DELETE_DAYS", default_value = "90")]
    pub hard_delete_days: u32,

    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the web server and the scheduler (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,

        /// Bearer token required on the API routes
        #[arg(long, env = "API_TOKEN", hide_env_values = true)]
        api_token: String,

        /// Cron expression of the periodic sync (5 or 6 fields)
        #[arg(long, env = "JOB_SYNC_CRON", default_value = "0 0 * * * *")]
        sync_cron: String,

        /// Cron expression of the periodic cleanup (5 or 6 fields)
        #[arg(long, env = "CLEANUP_CRON", default_value = "0 0 2 * * *")]
        cleanup_cron: String,
    },
    /// Run one full sync and exit
    Sync {
        #[arg(long)]
        keywords: Option<String>,

        #[arg(long)]
        location: Option<String>,
    },
    /// Run one cleanup pass and exit
    Cleanup,
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> anyhow::Result<Command> {
        if let Some(command) = &self.command {
            return Ok(command.clone());
        }
        Ok(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            api_token: std::env::var("API_TOKEN")
                .map_err(|_| anyhow::anyhow!("API_TOKEN must be set to serve the API"))?,
            sync_cron: std::env::var("JOB_SYNC_CRON")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            cleanup_cron: std::env::var("CLEANUP_CRON")
                .unwrap_or_else(|_| "0 0 2 * * *".to_string()),
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            default_keywords: trimmed(&self.default_keywords),
            default_locations: trimmed(&self.default_locations),
            fetch_limit: self.fetch_limit,
            period: self.fetch_period,
            pair_delay: Duration::from_millis(self.pair_delay_ms),
            atomic_merge: self.atomic_merge,
        }
    }

    /// Backoff for platform fetches: 1s doubling up to 10s, with jitter.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_max_attempts, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(true)
    }

    pub fn schedule(&self, sync_cron: &str, cleanup_cron: &str) -> ScheduleConfig {
        ScheduleConfig {
            sync_cron: sync_cron.to_string(),
            cleanup_cron: cleanup_cron.to_string(),
            soft_delete_days: self.soft_delete_days,
            hard_delete_days: self.hard_delete_days,
        }
    }
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec![
            "jobsync",
            "--database-url",
            "postgres://localhost/jobs",
            "--encryption-key",
            "secret",
        ];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_sync_settings() {
        let config = parse(&[]);
        let settings = config.sync_settings();

        assert_eq!(settings.fetch_limit, 50);
        assert_eq!(settings.period, Period::Month);
        assert_eq!(settings.pair_delay, Duration::from_secs(2));
        assert!(!settings.atomic_merge);
        assert_eq!(config.soft_delete_days, 30);
        assert_eq!(config.hard_delete_days, 90);

        let retry = config.retry_policy();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.max_delay, Duration::from_secs(10));
        assert!(retry.jitter);
    }

    #[test]
    fn list_arguments_are_split_and_trimmed() {
        let config = parse(&[
            "--default-keywords",
            "rust, go ,",
            "--default-locations",
            "Paris, France; Nantes, France",
            "--fetch-period",
            "24h",
        ]);
        let settings = config.sync_settings();

        assert_eq!(settings.default_keywords, vec!["rust", "go"]);
        assert_eq!(settings.default_locations, vec!["Paris, France", "Nantes, France"]);
        assert_eq!(settings.period, Period::Day);
    }

    #[test]
    fn one_shot_sync_subcommand() {
        let config = parse(&["sync", "--keywords", "rust", "--location", "Lyon"]);
        match config.resolved_command().unwrap() {
            Command::Sync { keywords, location } => {
                assert_eq!(keywords.as_deref(), Some("rust"));
                assert_eq!(location.as_deref(), Some("Lyon"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
