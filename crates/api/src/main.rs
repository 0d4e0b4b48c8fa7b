//! Emporium API server.
//!
//! Serves the JSON API used by the admin dashboard and the storefront on
//! port 4000 by default.
//!
//! Migrations are not run on startup. Apply them with:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use emporium_api::config::{ApiConfig, LogFormat};
use emporium_api::state::AppState;
use emporium_api::{app, db};
use sentry::integrations::tracing as sentry_tracing;
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "emporium_api=info,tower_http=debug";

/// Start Sentry (when `SENTRY_DSN` is set) and the tracing subscriber.
///
/// The returned guard flushes Sentry on drop and must outlive the server.
fn init_telemetry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config.sentry_environment.clone().map(Into::into),
                sample_rate: config.sentry_sample_rate,
                traces_sample_rate: config.sentry_traces_sample_rate,
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    });

    // Warnings and errors become Sentry events, info and debug breadcrumbs.
    let sentry_layer = sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR | Level::WARN => sentry_tracing::EventFilter::Event,
        Level::INFO | Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        Level::TRACE => sentry_tracing::EventFilter::Ignore,
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().flatten_event(true)))
        .with((!json).then(fmt::layer))
        .with(sentry_layer)
        .init();

    if sentry.is_some() {
        tracing::info!("Sentry initialized");
    }
    sentry
}

#[tokio::main]
async fn main() {
    let config = ApiConfig::from_env().expect("Failed to load configuration");
    let _sentry = init_telemetry(&config);

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let addr = config.socket_addr();
    let state = AppState::new(config, pool).expect("Failed to configure mailer");
    if state.mailer().is_none() {
        tracing::warn!("SMTP is not configured; password reset emails will not be sent");
    }

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Emporium API listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
