mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use zeladoria_api::auth::{AppState, AppStateInner};
use zeladoria_api::bootstrap::{self, AdminBootstrap};
use zeladoria_api::social::FacebookClient;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zeladoria=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and seed data
    let db = zeladoria_db::Database::open(&config.db_path)?;
    match bootstrap::run(&db, &config.admin_email, config.admin_password.as_deref())? {
        AdminBootstrap::Created { generated_password: Some(password), .. } => {
            warn!(
                "No ZELADORIA_ADMIN_PASSWORD set; generated password for {}: {}",
                config.admin_email, password
            );
        }
        AdminBootstrap::Created { .. } | AdminBootstrap::AlreadyPresent => {}
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        facebook: FacebookClient::new(config.facebook_graph_url.clone())?,
    });

    let app = zeladoria_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Zeladoria API listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
