//! HTTP front for the game pool.
//!
//! Routes:
//!
//! - `GET /`: greeting
//! - `GET /games`: JSON view of the slots
//! - `GET /game/flush`: terminate every game
//! - `GET /game/{id}`: one interaction with game `id`, created on demand; the body is the
//!   game's response
//! - `DELETE /game/{id}`: terminate game `id`
//!
//! Every pool operation blocks, so handlers run them with `tokio::task::spawn_blocking`.
//! Interactions are also bounded by the configured interaction timeout. A timed out request
//! answers 504 while its worker thread keeps waiting on the game.

use std::{error::Error as _, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::{configuration::Configuration, error::PoolError, pool::GamePool, GameId};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The pool every request goes through.
    pub pool: Arc<GamePool>,
    /// Upper bound for one interaction.
    pub interaction_timeout: Duration,
}

impl AppState {
    /// Wrap `pool` with the interaction timeout from `config`.
    pub fn new(pool: Arc<GamePool>, config: &Configuration) -> Self {
        Self {
            pool,
            interaction_timeout: config.interaction_timeout(),
        }
    }
}

/// API error body.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    /// Machine readable error kind.
    pub code: &'static str,
    /// Error and its causes.
    pub message: String,
}

/// Error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Machine readable error kind.
    pub code: &'static str,
    /// Error and its causes.
    pub message: String,
}

impl ApiError {
    /// 500, the pool could not create or stop a game.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }

    /// 502, the game misbehaved.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "BAD_GATEWAY",
            message: message.into(),
        }
    }

    /// 504, the game did not answer in time.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            code: "TIMEOUT",
            message: message.into(),
        }
    }

    /// 404.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        // the HTTP caller never sees the source chain otherwise
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        match err {
            PoolError::Protocol { .. } => ApiError::bad_gateway(message),
            PoolError::Spawn { .. }
            | PoolError::Eviction { .. }
            | PoolError::Shutdown { .. }
            | PoolError::Flush { .. } => ApiError::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Slot view returned by `GET /games`.
#[derive(Debug, Serialize)]
pub struct PoolStatus {
    /// Number of slots.
    pub capacity: usize,
    /// Slot receiving the next new game.
    pub next_slot: usize,
    /// Identifier held by each slot.
    pub slots: Vec<Option<GameId>>,
}

/// Run a blocking pool operation off the async workers, optionally bounded in time.
async fn run_blocking<T, F>(timeout: Option<Duration>, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PoolError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(operation);
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis(), "game operation timed out");
                return Err(ApiError::timeout(format!(
                    "game did not answer within {} ms",
                    limit.as_millis()
                )));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!(error = %e, "blocking pool task failed");
            Err(ApiError::internal(format!("task join error: {e}")))
        }
    }
}

/// `GET /`
async fn hello() -> &'static str {
    "Hello world!"
}

/// `GET /game/{id}`
#[instrument(skip(state))]
async fn play(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
) -> Result<String, ApiError> {
    let pool = state.pool.clone();
    let payload =
        run_blocking(Some(state.interaction_timeout), move || pool.interact(id)).await?;
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

/// `DELETE /game/{id}`
#[instrument(skip(state))]
async fn quit(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
) -> Result<StatusCode, ApiError> {
    let pool = state.pool.clone();
    if run_blocking(None, move || pool.terminate(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("game {id} is not running")))
    }
}

/// `GET /game/flush`
#[instrument(skip(state))]
async fn flush(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let pool = state.pool.clone();
    run_blocking(None, move || pool.flush_all()).await?;
    Ok("Flushed away!")
}

/// `GET /games`
async fn status(State(state): State<AppState>) -> Result<Json<PoolStatus>, ApiError> {
    let pool = state.pool.clone();
    // the pool lock may be held by a slow eviction
    let status = run_blocking(None, move || {
        let (slots, next_slot) = pool.snapshot_with_cursor();
        Ok(PoolStatus {
            capacity: slots.len(),
            next_slot,
            slots,
        })
    })
    .await?;
    Ok(Json(status))
}

/// Build the router over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/games", get(status))
        .route("/game/flush", get(flush))
        .route("/game/{id}", get(play).delete(quit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the pool on the configured address until Ctrl+C, then flush every game.
///
/// A failing flush is logged, never fatal.
pub async fn run_server(pool: Arc<GamePool>, config: &Configuration) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen_addr();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "game server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped, flushing games");
    match tokio::task::spawn_blocking(move || pool.flush_all()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("flush on shutdown failed: {e}"),
        Err(e) => error!("flush task failed: {e}"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("could not listen for Ctrl+C, shutting down: {e}");
    }
}
