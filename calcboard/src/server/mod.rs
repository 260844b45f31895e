//! HTTP JSON API for calcboard.
//!
//! Endpoints:
//! - GET    /health                              - Server status (no auth)
//! - POST   /auth/register                       - Create an account
//! - POST   /auth/login                          - JSON login, returns tokens and profile
//! - POST   /auth/token                          - Form login, returns an access token
//! - POST   /auth/refresh                        - Rotate a refresh token
//! - POST   /auth/logout                         - Revoke the presented token
//! - POST   /calculations                        - Add a calculation
//! - GET    /calculations                        - Browse, newest first
//! - GET    /calculations/{id}                   - Read one
//! - PUT    /calculations/{id}                   - Edit one
//! - DELETE /calculations/{id}                   - Delete one
//! - GET    /api/statistics                      - Overview statistics
//! - GET    /api/history                         - Paginated history
//! - GET    /api/statistics/operation/{operation} - Single-operation statistics
//!
//! Everything except `/health` and the login/registration routes requires
//! `Authorization: Bearer <access token>`. All responses are JSON.

mod auth;
mod calculations;
mod error;
mod state;
mod statistics;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{Method, StatusCode};
use axum::middleware::{self as axum_middleware, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::signal::ctrl_c;
use tower_http::cors::{Any, CorsLayer};

pub use self::error::ApiError;
pub use self::state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(handle_health))
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/token", post(auth::handle_token))
        .route("/auth/refresh", post(auth::handle_refresh))
        .route("/auth/logout", post(auth::handle_logout))
        .route(
            "/calculations",
            post(calculations::handle_create).get(calculations::handle_list),
        )
        .route(
            "/calculations/{id}",
            get(calculations::handle_get)
                .put(calculations::handle_update)
                .delete(calculations::handle_delete),
        )
        .route("/api/statistics", get(statistics::handle_statistics))
        .route("/api/history", get(statistics::handle_history))
        .route(
            "/api/statistics/operation/{operation}",
            get(statistics::handle_operation),
        )
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn(log_request))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.server.bind_address();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "calcboard listening");
    eprintln!("calcboard listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Fallback handler for unmatched routes.
async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "detail": "Not Found" })),
    )
}

/// Log method, path, status and latency of every request.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
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
}
