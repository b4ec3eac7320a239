//! # Interview Fake Backend - Main Application Entry Point
//!
//! One process hosting the two disposable test doubles used by integration
//! tests in place of the real ML services:
//!
//! - **Similarity scoring stub**: an HTTP endpoint that fakes the slow
//!   vacancy/resume comparison model (`POST /analyze`), plus health and
//!   metrics endpoints.
//! - **Call-audio stub**: a WebSocket endpoint (`/call/{token}`) that fakes
//!   the speech service: it records all inbound audio to disk while
//!   replaying a canned payload to the caller on a fixed cadence.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (defaults, config.toml, environment)
//! - **state**: shared configuration and metrics
//! - **health**: health and metrics endpoints
//! - **middleware**: per-endpoint request metrics
//! - **handlers**: the scoring endpoint
//! - **relay**: the call-audio listener, session supervision, and storage
//! - **error**: HTTP error types and JSON error responses
//!
//! Both listeners are spawned from here and raced against the shutdown
//! signal; a `CancellationToken` propagates shutdown into live call sessions.

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod relay;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AppConfig;
use error::AppError;
use relay::{PayloadCache, RelayContext};
use state::AppState;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting interview-fake-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Scoring endpoints on {}", config.server.bind_addr());
    info!("Call-audio endpoint on {}", config.relay.bind_addr());

    tokio::fs::create_dir_all(&config.relay.received_dir)
        .await
        .with_context(|| {
            format!(
                "creating recording directory {}",
                config.relay.received_dir
            )
        })?;
    info!(dir = %config.relay.received_dir, "Recording directory ready");

    // Warm the payload cache so a missing artifact is reported at startup
    let payload = PayloadCache::new(config.relay.payload_path.clone());
    payload.load().await;

    let app_state = AppState::new(config.clone());
    let shutdown = CancellationToken::new();

    let relay_listener = TcpListener::bind(config.relay.bind_addr())
        .await
        .with_context(|| format!("binding call-audio listener on {}", config.relay.bind_addr()))?;
    let relay_ctx = RelayContext {
        received_dir: config.relay.received_dir.clone().into(),
        payload: payload.clone(),
        stream_interval: config.relay.stream_interval(),
        state: app_state.clone(),
        shutdown: shutdown.clone(),
    };
    let mut relay_task = tokio::spawn(relay::serve(relay_listener, relay_ctx));

    let http_state = app_state.clone();
    let http_payload = payload.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(http_state.clone()))
            .app_data(web::Data::new(http_payload.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(format!("Invalid JSON body: {err}")).into()
            }))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::RequestMetrics)
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/analyze", web::post().to(handlers::analyze))
    })
    .bind(config.server.bind_addr())?
    .run();

    let server_handle = server.handle();
    let mut server_task = tokio::spawn(server);

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task error: {}", e),
            }
        }
        result = &mut relay_task => {
            match result {
                Ok(Ok(())) => info!("Call-audio relay stopped"),
                Ok(Err(e)) => error!("Call-audio relay error: {}", e),
                Err(e) => error!("Call-audio relay task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping servers...");
            shutdown.cancel();
            server_handle.stop(true).await;
            let _ = relay_task.await;
        }
    }

    shutdown.cancel();
    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize tracing with an environment-driven filter.
///
/// `RUST_LOG` controls verbosity; the default keeps this crate at debug and
/// actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_fake_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Resolve when the process is asked to stop (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
