//! Postkeep Server
//!
//! Keeps scraped post records in memory, serves them over a small JSON API
//! and periodically writes them to a day-stamped snapshot file.

mod config;
mod error;
mod extractors;
mod handlers;
mod logging;
mod storage;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use config::Config;
use storage::{PersistenceEngine, RecordStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    /// Answer unmatched requests with 404 instead of an empty 200
    pub strict_routes: bool,
}

#[tokio::main]
async fn main() {
    let config = Config::parse();

    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    let _log_guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("[FATAL] {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Postkeep Server v{}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    if let Err(e) = run_server(config).await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: Config) -> Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let store = Arc::new(RecordStore::new());
    let cancel = CancellationToken::new();

    info!(
        "Snapshot dir={}, prefix={}, cooldown={}s",
        config.data_dir.display(),
        config.snapshot_prefix,
        config.cooldown
    );
    let engine = PersistenceEngine::start(
        store.clone(),
        config.snapshot_file(),
        config.persistence_options(),
        cancel.clone(),
    )
    .await
    .context("Failed to load snapshot")?;

    let state = AppState {
        store,
        strict_routes: config.strict_routes,
    };

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    info!("Server started http://{}", listener.local_addr()?);
    let served = axum::serve(listener, app(state))
        .with_graceful_shutdown({
            let cancel = cancel.clone();
            async move { cancel.cancelled().await }
        })
        .await;

    engine.stop().await;
    served.context("Server error")?;
    info!("Server stopped");

    Ok(())
}

/// Build the request router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/posts/",
            get(handlers::posts::list)
                .post(handlers::posts::create)
                .fallback(handlers::fallback),
        )
        .route(
            "/posts/:id/",
            get(handlers::posts::get)
                .put(handlers::posts::update)
                .delete(handlers::posts::delete)
                .fallback(handlers::fallback),
        )
        .fallback(handlers::fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
}
