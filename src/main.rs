//! Quiz server binary entrypoint wiring configuration, storage, the round worker and REST routes.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::{AppConfig, StorageConfig};
use dao::quiz_store::{FileQuizStore, MemoryQuizStore, QuizStore};
use services::{media::MediaBinder, round_worker};
use state::{AppState, SharedState};

const UPLOAD_SWEEP_EVERY: Duration = Duration::from_secs(10 * 60);
const UPLOAD_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store: Arc<dyn QuizStore> = match &config.storage {
        StorageConfig::Memory => {
            warn!("using in-memory storage; records are lost on exit");
            Arc::new(MemoryQuizStore::new())
        }
        StorageConfig::File { path } => Arc::new(
            FileQuizStore::open(path.clone())
                .await
                .with_context(|| format!("opening quiz records at {}", path.display()))?,
        ),
    };

    let (app_state, worker_rx) = AppState::load(config, store)
        .await
        .context("loading quiz state")?;

    let binder: Arc<dyn MediaBinder> = app_state.uploads();
    tokio::spawn(round_worker::run(app_state.clone(), binder, worker_rx));
    match round_worker::recover(&app_state).await {
        Ok(0) => {}
        Ok(count) => info!(count, "requeued pending round edits"),
        Err(err) => warn!(error = %err, "could not recover pending round edits"),
    }
    tokio::spawn(sweep_uploads(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Periodically drop uploads no question edit ever claimed.
async fn sweep_uploads(state: SharedState) {
    let mut interval = tokio::time::interval(UPLOAD_SWEEP_EVERY);
    loop {
        interval.tick().await;
        let removed = state.uploads().sweep_abandoned(UPLOAD_MAX_AGE);
        if removed > 0 {
            info!(removed, "abandoned uploads removed");
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
