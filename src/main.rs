mod auth;
mod collectors;
mod config;
mod db;
mod error;
mod merge;
mod models;
mod retry;
mod routes;
mod skills;
mod sync;
#[cfg(test)]
mod testing;
mod vault;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::collectors::{HttpScrapeClient, IndeedSource, JobSource, LinkedInSource};
use crate::config::{Command, Config};
use crate::merge::{PersistenceMerger, PgJobStore};
use crate::routes::AppState;
use crate::sync::{PgPreferenceSource, SyncOrchestrator};
use crate::vault::{CredentialVault, LinkedInOAuth, PgCredentialStore, TokenCipher};

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: PgPool) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobsync=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Services shared by every command.
struct Services {
    orchestrator: Arc<SyncOrchestrator>,
    vault: Arc<CredentialVault>,
    oauth: Arc<LinkedInOAuth>,
}

fn build_services(config: &Config, pool: &PgPool) -> anyhow::Result<Services> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("jobsync/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let cipher = TokenCipher::new(&config.encryption_key)
        .map_err(|e| anyhow::anyhow!("Invalid ENCRYPTION_KEY: {e}"))?;
    let oauth = Arc::new(LinkedInOAuth::new(
        http.clone(),
        &config.linkedin_client_id,
        &config.linkedin_client_secret,
        &config.linkedin_redirect_uri,
    ));
    let vault = Arc::new(CredentialVault::new(
        cipher,
        Arc::new(PgCredentialStore::new(pool.clone())),
        oauth.clone(),
    ));

    let scraper = Arc::new(HttpScrapeClient::new(http, &config.scraper_url));
    let retry = config.retry_policy();
    let sources: Vec<Arc<dyn JobSource>> = vec![
        Arc::new(
            LinkedInSource::new(scraper.clone(), vault.clone(), config.sync_user_id)
                .with_retry(retry.clone()),
        ),
        Arc::new(IndeedSource::new(scraper).with_retry(retry)),
    ];

    let orchestrator = Arc::new(SyncOrchestrator::new(
        sources,
        PersistenceMerger::new(Arc::new(PgJobStore::new(pool.clone()))),
        Arc::new(PgPreferenceSource::new(pool.clone())),
        config.sync_settings(),
    ));

    Ok(Services {
        orchestrator,
        vault,
        oauth,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(&config.log_format);

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let services = build_services(&config, &pool)?;

    match config.resolved_command()? {
        Command::Sync { keywords, location } => {
            let stats = services.orchestrator.force_sync(keywords, location).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Cleanup => {
            let report = services
                .orchestrator
                .cleanup_old_postings(config.soft_delete_days, config.hard_delete_days)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve {
            listen_addr,
            api_token,
            sync_cron,
            cleanup_cron,
        } => {
            let mut scheduler = sync::scheduler::start_scheduler(
                services.orchestrator.clone(),
                config.schedule(&sync_cron, &cleanup_cron),
            )
            .await?;

            let state = AppState {
                orchestrator: services.orchestrator,
                vault: services.vault,
                oauth: services.oauth,
                api_token_hash: auth::hash_token(&api_token).into(),
                soft_delete_days: config.soft_delete_days,
                hard_delete_days: config.hard_delete_days,
            };

            let readyz_pool = pool.clone();
            let app = Router::new()
                .route("/healthz", get(healthz))
                .route("/readyz", get(move || readyz(readyz_pool.clone())))
                .merge(routes::api::router(state))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutdown signal received, exiting gracefully");
                })
                .await?;

            scheduler.shutdown().await?;
        }
    }

    Ok(())
}
