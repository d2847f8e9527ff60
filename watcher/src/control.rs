//! HTTP control surface for the running watcher.
//!
//! This module provides the local command API:
//!
//! - `POST /check` - run a detection pass immediately
//! - `PUT /interval` - reconfigure the poll interval (minimum 1 minute)
//! - `PUT /channel` - change the destination webhook
//! - `GET /repos` - list repository names from the last snapshot
//! - `GET /health` - liveness check
//!
//! Interval and webhook changes write straight to the shared settings;
//! force-checks and repository listings go to the runner over the command
//! channel and wait for its reply, so passes stay serialized on one
//! timeline.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::MIN_INTERVAL_SECS;
use crate::session::{ControlCommand, SharedSettings};

/// Shared state for all control handlers.
#[derive(Clone)]
pub struct AppState {
    /// Command channel into the runner.
    pub commands: mpsc::Sender<ControlCommand>,

    /// Runtime-changeable settings.
    pub settings: SharedSettings,
}

/// Body for `PUT /interval`.
#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    /// New poll interval in minutes.
    pub minutes: u64,
}

/// Body for `PUT /channel`.
#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    /// New destination webhook URL.
    pub webhook_url: String,
}

/// Confirmation body for successful mutations.
#[derive(Debug, Serialize)]
struct Confirmation {
    message: String,
}

/// Builds the control router.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/check", post(force_check))
        .route("/interval", put(set_interval))
        .route("/channel", put(set_channel))
        .route("/repos", get(list_repos))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /check`: runs a pass now and reports the outcome.
async fn force_check(State(state): State<AppState>) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();

    if state
        .commands
        .send(ControlCommand::ForceCheck { reply: reply_tx })
        .await
        .is_err()
    {
        return unavailable();
    }

    match reply_rx.await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(_) => unavailable(),
    }
}

/// `PUT /interval`: rejects values below one minute, otherwise updates the
/// shared interval for the next scheduling decision.
async fn set_interval(
    State(state): State<AppState>,
    Json(request): Json<IntervalRequest>,
) -> Response {
    let secs = request.minutes.saturating_mul(60);
    if secs < MIN_INTERVAL_SECS {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!(
                    "interval must be at least {} minute(s)",
                    MIN_INTERVAL_SECS / 60
                )
            })),
        )
            .into_response();
    }

    state.settings.write().await.interval = Duration::from_secs(secs);
    info!(minutes = request.minutes, "Poll interval updated");

    (
        StatusCode::OK,
        Json(Confirmation {
            message: format!("Check interval updated to {} minutes.", request.minutes),
        }),
    )
        .into_response()
}

/// `PUT /channel`: points future deliveries at a new webhook.
async fn set_channel(
    State(state): State<AppState>,
    Json(request): Json<ChannelRequest>,
) -> Response {
    let url = request.webhook_url.trim().to_string();
    if url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "webhook_url must not be empty" })),
        )
            .into_response();
    }

    state.settings.write().await.webhook_url = Some(url);
    info!("Notification channel updated");

    (
        StatusCode::OK,
        Json(Confirmation {
            message: "Notifications will now be sent to the new channel.".to_string(),
        }),
    )
        .into_response()
}

/// `GET /repos`: repository names from the last snapshot.
async fn list_repos(State(state): State<AppState>) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();

    if state
        .commands
        .send(ControlCommand::ListRepos { reply: reply_tx })
        .await
        .is_err()
    {
        return unavailable();
    }

    match reply_rx.await {
        Ok(repos) => (StatusCode::OK, Json(json!({ "repos": repos }))).into_response(),
        Err(_) => unavailable(),
    }
}

/// `GET /health`: liveness.
async fn health() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "watcher is not running" })),
    )
        .into_response()
}
