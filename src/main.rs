//! # Whisper Upload Backend - Main Application Entry Point
//!
//! Sets up an Actix-web HTTP server exposing three routes:
//! - `GET /` — static single-page upload frontend
//! - `POST /transcribe` — multipart audio upload, returns the transcript as JSON
//! - `GET /health` — service status and counters
//!
//! ## Application Architecture:
//! - **config**: layered application configuration (TOML file + environment variables)
//! - **state**: shared application state (config, engine, metrics)
//! - **error**: error types and their HTTP mapping
//! - **middleware**: request logging and counters
//! - **handlers**: the HTTP endpoints
//! - **transcription**: language normalization, the Whisper engine, result shaping
//!
//! The transcription engine is constructed here, once, and injected into the
//! handlers through `AppState`; its model loads lazily on the first upload.

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::TranscriptionEngine;

/// Global shutdown flag set by the signal handler task and polled by the
/// main task to stop the server gracefully.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(config.server.debug)?;

    info!(
        "Starting whisper-upload-backend v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "Configuration loaded: {}:{} (model '{}')",
        config.server.host, config.server.port, config.model.name
    );

    // The engine is built once here and shared by every request; the model
    // itself loads on the first transcription
    let engine = Arc::new(TranscriptionEngine::new(config.model.name.clone()));
    let app_state = AppState::new(config.clone(), engine);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::RequestLogging)
            .route("/", web::get().to(handlers::index))
            .route("/transcribe", web::post().to(handlers::transcribe))
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    // Race the server against the shutdown signal
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// `RUST_LOG` wins when set; otherwise the debug toggle picks between a
/// debug-level and an info-level default filter.
fn init_tracing(debug: bool) -> Result<()> {
    let default_filter = if debug {
        "whisper_upload_backend=debug,actix_web=debug"
    } else {
        "whisper_upload_backend=info,actix_web=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown (SIGTERM and SIGINT).
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown flag, polling every 100ms to avoid busy-waiting.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
