//! Interview server: HTTP entry point.
//!
//! This crate is the composition root: it loads config, builds the
//! platform adapters, hands them to the session manager, and serves the
//! manager's operations over axum.

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use interview_core::event_bus::EventBus;
use interview_platform::USER_ID_HEADER;
use interview_types::{InterviewError, Result};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use routes::*;
use state::AppState;

const EVENT_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route("/sessions/:id", get(get_session_handler))
        .route("/sessions/:id/start", post(start_session_handler))
        .route("/sessions/:id/complete", post(complete_session_handler))
        .route("/sessions/:id/analytics", get(get_analytics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(&config)?;
    tokio::spawn(drain_events(state.manager.event_bus().clone()));

    let address = config.address();
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| InterviewError::Config(format!("cannot bind {address}: {e}")))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| InterviewError::Other(format!("server error: {e}")))?;

    info!("Server shut down");
    Ok(())
}

/// Forward lifecycle events into the log.
async fn drain_events(bus: EventBus) {
    let mut ticker = tokio::time::interval(EVENT_DRAIN_INTERVAL);
    loop {
        ticker.tick().await;
        for event in bus.drain() {
            info!(session_id = event.session_id(), ?event, "session event");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
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
