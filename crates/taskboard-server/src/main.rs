mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use taskboard_api::auth::{AppState, AppStateInner};
use taskboard_crypto::{SecretHasher, TokenCodec};
use taskboard_db::Database;
use taskboard_invites::{DisabledNotifier, HttpEmailNotifier, InviteService, Notifier};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);

    let notifier: Arc<dyn Notifier> = match &config.email {
        Some(email) => {
            info!("Invite emails go out through {}", email.api_url);
            Arc::new(HttpEmailNotifier::new(
                email.api_url.clone(),
                email.api_key.clone(),
                email.sender.clone(),
                email.sender_name.clone(),
            ))
        }
        None => {
            warn!("Email is not configured; invites will be stored but not delivered");
            Arc::new(DisabledNotifier)
        }
    };

    let invites = InviteService::new(
        db.clone(),
        TokenCodec::default(),
        notifier,
        config.invite_settings(),
    );

    let state: AppState = Arc::new(AppStateInner {
        db,
        invites,
        passwords: SecretHasher::default(),
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = taskboard_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Taskboard server listening on {}", addr);
    info!("Invites expire after {} days", config.invite_ttl_days);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
