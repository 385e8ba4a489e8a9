//! Sign-in-with-Ethereum authentication server
//!
//! Serves the nonce / verify / session endpoints and runs the periodic nonce
//! purge alongside the HTTP server.

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;

use siwe_auth_server::auth::{AuthService, ChallengeStore, InMemoryChallengeStore, PurgeTask};
use siwe_auth_server::clock::{Clock, SystemClock};
use siwe_auth_server::config::Config;
use siwe_auth_server::db::{self, PgChallengeStore, PgUserDirectory};
use siwe_auth_server::routes;
use siwe_auth_server::state::AppState;
use siwe_auth_server::users::{InMemoryUserDirectory, UserDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        domain = %config.siwe_domain,
        chain_id = ?config.siwe_chain_id,
        "Starting sign-in server"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (challenges, users): (Arc<dyn ChallengeStore>, Arc<dyn UserDirectory>) =
        if config.database_url.is_some() {
            let pool = db::create_pool(&config)
                .await
                .context("Failed to connect to database")?;
            db::run_migrations(&pool).await?;

            let challenges: Arc<dyn ChallengeStore> = Arc::new(PgChallengeStore::new(
                pool.clone(),
                clock.clone(),
                config.nonce_ttl(),
            ));
            let users: Arc<dyn UserDirectory> =
                Arc::new(PgUserDirectory::new(pool, clock.clone()));
            (challenges, users)
        } else {
            tracing::warn!("DATABASE_URL not set, using in-memory stores (state is lost on restart)");
            let challenges: Arc<dyn ChallengeStore> = Arc::new(InMemoryChallengeStore::new(
                clock.clone(),
                config.nonce_ttl(),
            ));
            let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new(clock.clone()));
            (challenges, users)
        };

    let auth_service = Arc::new(AuthService::new(
        config.auth_settings(),
        challenges.clone(),
        users,
        clock,
    ));

    let purge = PurgeTask::spawn(
        challenges,
        config.nonce_purge_interval(),
        config.store_timeout,
    );

    let app_state = AppState::new(auth_service, config.cookie_secure());
    let app = routes::app_router(app_state, configure_cors(&config));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    purge.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed_origins_str = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed_origins_str.trim().is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    // Credentialed requests carry the session cookie
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
