//! # Triage API Server
//!
//! Serves the email triage API: escalation lifecycle, role-scoped reads,
//! user management and the audit trail.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/triage JWT_SECRET=... cargo run -p triage-api
//! ```

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use triage_shared::{
    db::{
        migrations::run_migrations,
        pool::{self, create_pool, DatabaseConfig},
    },
    realtime::ChangeFeed,
    store::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        "Triage API Server v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.api.environment
    );

    if config.dev_bypass_user().is_some() {
        tracing::warn!("DEV_AUTH_BYPASS is active: requests without a token run as DEV_USER_ID");
    }

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&pool).await?;

    let changes = match config.redis_url.as_deref() {
        Some(url) => match ChangeFeed::connect(url).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(error = %e, "Realtime change feed unavailable, continuing without it");
                ChangeFeed::Disabled
            }
        },
        None => ChangeFeed::Disabled,
    };

    let bind_address = config.bind_address();
    let state = AppState::new(Arc::new(PgStore::new(pool.clone())), changes, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::close_pool(pool).await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "triage_api=info,triage_shared=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
