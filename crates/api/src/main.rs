use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use studyroom_api::{build_router, state::AppState};
use studyroom_config::{Settings, StoreBackend};
use studyroom_services::dao::{MemoryMessageStore, MessageDao, MessageStore};
use studyroom_services::{Clock, ExpirySweeper, JwtIdentityLookup, SystemClock};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = Settings::load().context("Failed to load settings")?;
    let ttl = Duration::from_secs(settings.chat.message_ttl_secs);

    let store: Arc<dyn MessageStore> = match settings.database.backend {
        StoreBackend::Mongo => {
            let client = mongodb::Client::with_uri_str(&settings.database.url)
                .await
                .context("Failed to connect to MongoDB")?;
            let db = client.database(&settings.database.name);
            studyroom_db::ensure_indexes(&db, ttl).await?;
            info!(database = %settings.database.name, "Using MongoDB message store");
            Arc::new(MessageDao::new(&db))
        }
        StoreBackend::Memory => {
            info!("Using in-memory message store");
            Arc::new(MemoryMessageStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let identity = Arc::new(JwtIdentityLookup::new(&settings.jwt));

    let sweeper = (settings.chat.sweep_interval_secs > 0).then(|| {
        ExpirySweeper::new(
            store.clone(),
            clock.clone(),
            ttl,
            Duration::from_secs(settings.chat.sweep_interval_secs),
        )
        .spawn()
    });

    let addr = settings.bind_addr();
    let state = AppState::new(settings, store, identity, clock);
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Study room chat listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("Shut down");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var_os("STUDYROOM_LOG_JSON").is_some() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
