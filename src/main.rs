// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour Tracker API Server
//!
//! Tracks walkers through tours by matching their reported positions
//! against each tour's keypoints.

use std::path::Path;
use std::sync::Arc;
use tour_tracker::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, Storage},
    services::TourCatalog,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Tour Tracker API");

    let storage = match &config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            Storage::in_memory()
        }
        StorageBackend::Firestore { project_id } => {
            let db = FirestoreDb::new(project_id)
                .await
                .expect("Failed to connect to Firestore");
            tracing::info!(project = %project_id, "Firestore storage initialized");
            Storage::firestore(db)
        }
    };

    let state = Arc::new(AppState::new(config.clone(), storage));

    // Seed the tour catalog
    if Path::new(&config.tours_path).exists() {
        tracing::info!(path = %config.tours_path, "Loading tour catalog");
        let tours =
            TourCatalog::load_from_file(&config.tours_path).expect("Failed to load tour catalog");
        state.catalog.seed(&tours).await?;
    } else {
        tracing::warn!(path = %config.tours_path, "Tour catalog not found, starting empty");
    }

    // Build router
    let app = tour_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tour_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
