//! # Workshop Admin API Server
//!
//! Serves the account lifecycle and audit trail endpoints.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=... DATABASE_URL=postgresql://... cargo run -p workshop-api
//! STORE_BACKEND=memory JWT_SECRET=... BOOTSTRAP_ADMIN_PASSWORD=... cargo run -p workshop-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workshop_api::{
    app::{build_router, AppState},
    config::{Config, StoreBackend},
};
use workshop_shared::db::{
    migrations::run_migrations,
    pool::{create_pool, DatabaseConfig},
};
use workshop_shared::store::{AuditStore, MemoryStore, PgStore, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Workshop Admin API v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("failed to load configuration")?;

    let (users, audit): (Arc<dyn UserStore>, Arc<dyn AuditStore>) = match config.store {
        StoreBackend::Postgres => {
            let url = config
                .database
                .url
                .clone()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(DatabaseConfig {
                url,
                max_connections: config.database.max_connections,
                ..Default::default()
            })
            .await
            .context("failed to connect to database")?;
            run_migrations(&pool).await.context("failed to run migrations")?;

            let store = Arc::new(PgStore::new(pool));
            (store.clone() as Arc<dyn UserStore>, store as Arc<dyn AuditStore>)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Arc<dyn UserStore>, store as Arc<dyn AuditStore>)
        }
    };

    let bind_address = config.bind_address();
    let bootstrap_password = config.bootstrap_admin_password.clone();
    let state = AppState::new(users, audit, config);

    if let Some(password) = bootstrap_password {
        if state
            .accounts
            .ensure_bootstrap_admin(&password)
            .await
            .context("failed to seed bootstrap administrator")?
            .is_some()
        {
            tracing::info!("Seeded bootstrap administrator account");
        }
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "workshop_api=debug,workshop_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
