//! Tally - A small peer-to-peer transfer service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxSessionRepository, SqlxTransferRepository, SqlxUserRepository},
    },
    services::{AccountService, LoginGuard, TransferService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tally transfer service...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let transfer_repo = SqlxTransferRepository::boxed(pool.clone());

    // Login guard and services
    let login_guard = Arc::new(LoginGuard::new(&config.throttle));
    let account_service = Arc::new(AccountService::new(
        user_repo.clone(),
        session_repo,
        login_guard.clone(),
    ));
    let transfer_service = Arc::new(TransferService::new(transfer_repo, user_repo));

    let state = AppState {
        pool: pool.clone(),
        account_service: account_service.clone(),
        transfer_service,
        login_guard: login_guard.clone(),
    };

    // Sweep stale login-attempt records in the background
    {
        let guard = login_guard.clone();
        let sweep_interval =
            tokio::time::Duration::from_secs(config.throttle.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                guard.sweep_stale().await;
            }
        });
    }

    // Remove expired sessions periodically
    {
        let service = account_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match service.cleanup_expired_sessions().await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "cleaned up expired sessions");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "session cleanup failed"),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
