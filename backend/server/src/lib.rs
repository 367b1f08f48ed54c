//! Documentation of a slider-based feedback collection backend.
//!
//!
//!
//! # General Infrastructure
//! - Static form collects an admin block (user id, repeat count, database password) and slider answers
//! - Form posts one JSON body to `POST /submissions`
//! - Server validates, opens a Postgres connection with the supplied password, writes in one transaction
//! - If the post fails for any reason the form keeps a local copy instead, see the `client` crate
//!
//!
//!
//! # Endpoints
//!
//! ## `POST /submissions`
//! ```json
//! {
//!   "admin": { "userId": "u1", "repeatCount": 2, "dbPassword": "..." },
//!   "answers": [{ "id": "q1", "value": 7.5 }]
//! }
//! ```
//! - `201 { "id" }` once the submission and every answer are committed
//! - `400 { "error" }` for the first failing field check, nothing written
//! - `500 { "error" }` when the transaction was rolled back or something unexpected happened
//!
//! ## `GET /submissions/export.csv`
//! - Password travels in the `X-Db-Password` header, the connection is opened with it like a submission
//! - `200` CSV attachment `submissions.csv`, one line per answer, submissions without answers get one line with empty answer columns
//! - `400 { "error" }` without the header, `500 { "error" }` when the connection or query fails
//!
//! ## `GET /health`
//! - `200 ok`, liveness only, never touches the database
//!
//!
//!
//! # Environment
//!
//! | Key           | Default | Notes                                  |
//! |---------------|---------|----------------------------------------|
//! | `PORT`        | 8080    |                                        |
//! | `DB_HOST`     |         | required, warned about when missing    |
//! | `DB_PORT`     | 5432    |                                        |
//! | `DB_USER`     |         | required, warned about when missing    |
//! | `DB_NAME`     |         | required, warned about when missing    |
//! | `DB_SSLMODE`  | disable | `disable` or `require` (rustls)        |
//! | `CORS_ORIGIN` | `*`     | comma separated allow-list             |
//! | `RUST_LOG`    |         | `tracing_subscriber::EnvFilter` syntax |
//!
//!
//!
//! # Notes
//!
//! ## Password per request
//! The form sends the raw database password with every submission and the server never stores it.
//! A narrower token with a server-side secret would be preferable, but the form contract is kept as is.
use std::{any::Any, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod models;
pub mod routes;
pub mod state;
pub mod submission;
pub mod utils;

use config::{Config, CorsOrigin};
use models::ErrorBody;
use routes::{DB_PASSWORD_HEADER, export_handler, health_handler, submissions_handler};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let state = State::new(Config::load());

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/submissions", post(submissions_handler))
        .route("/submissions/export.csv", get(export_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.config.cors_origin))
        .with_state(state)
}

fn cors(origin: &CorsOrigin) -> CorsLayer {
    let allow_origin = match origin {
        CorsOrigin::Any => AllowOrigin::from(AnyOrigin),
        CorsOrigin::List(origins) => AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| warn!("Ignoring CORS origin {origin}: {e}"))
                .ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(DB_PASSWORD_HEADER)])
        .max_age(Duration::from_secs(60 * 60 * 24))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {detail}");

    let body = ErrorBody {
        error: "Unexpected error".to_string(),
    };

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
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
