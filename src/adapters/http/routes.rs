//! JSON routes over the tracker's read and write operations.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::adapters::metrics::MetricsRegistry;
use crate::usecases::scheduler::Scheduler;
use crate::usecases::settings::SettingsUpdate;
use crate::usecases::tracker::{CurrentRead, HealthView, PriceTracker, RefreshOutcome};

const DEFAULT_HISTORY_LIMIT: usize = 60;

/// Shared state for all handlers.
pub struct ApiState {
    pub tracker: Arc<PriceTracker>,
    pub scheduler: Arc<Scheduler>,
    pub metrics: Arc<MetricsRegistry>,
    pub service_name: String,
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/gold/current", get(current))
        .route("/api/gold/bar", get(bar))
        .route("/api/gold/ornament", get(ornament))
        .route("/api/gold/history", get(history))
        .route("/api/gold/history/today", get(history_today))
        .route("/api/gold/summary", get(summary))
        .route("/api/gold/refresh", post(refresh))
        .route("/api/health", get(health))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<Value>);

fn no_data() -> ApiResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"success": false, "error": "No data available"})),
    )
}

async fn index(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(json!({
        "name": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn current(State(state): State<Arc<ApiState>>) -> Response {
    match state.tracker.current_gated().await {
        CurrentRead::Ready(record) => Json(record).into_response(),
        CurrentRead::Disabled => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "API_DISABLED",
                "message": "Price API is disabled by the operator",
            })),
        )
            .into_response(),
        CurrentRead::NoData => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "No data available yet. Please wait for first fetch.",
                "message": "Data is being fetched, try again in a moment.",
            })),
        )
            .into_response(),
    }
}

async fn bar(State(state): State<Arc<ApiState>>) -> ApiResponse {
    match state.tracker.bar().await {
        Some(view) => (StatusCode::OK, Json(with_success(&view))),
        None => no_data(),
    }
}

async fn ornament(State(state): State<Arc<ApiState>>) -> ApiResponse {
    match state.tracker.ornament().await {
        Some(view) => (StatusCode::OK, Json(with_success(&view))),
        None => no_data(),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn history(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HistoryParams>,
) -> Json<Value> {
    let page = state
        .tracker
        .history(
            params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            params.offset.unwrap_or(0),
        )
        .await;
    Json(with_success(&page))
}

async fn history_today(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(with_success(&state.tracker.today().await))
}

async fn summary(State(state): State<Arc<ApiState>>) -> ApiResponse {
    match state.tracker.summary().await {
        Some(view) => (StatusCode::OK, Json(with_success(&view))),
        None => no_data(),
    }
}

async fn refresh(State(state): State<Arc<ApiState>>) -> ApiResponse {
    match state.tracker.force_refresh().await {
        RefreshOutcome::Refreshed { outcome, snapshot } => {
            let message = if outcome.is_success() {
                "Prices refreshed"
            } else {
                "Refresh failed, serving cached prices"
            };
            (
                StatusCode::OK,
                Json(json!({"success": true, "message": message, "data": snapshot})),
            )
        }
        RefreshOutcome::RateLimited { snapshot, retry_after } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": format!(
                    "Rate limited. Please wait {}s before refreshing again.",
                    retry_after.as_secs().max(1)
                ),
                "data": snapshot,
            })),
        ),
    }
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthView> {
    Json(state.tracker.health(state.scheduler.is_running()).await)
}

async fn get_settings(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(json!({"success": true, "settings": state.tracker.settings().await}))
}

async fn update_settings(
    State(state): State<Arc<ApiState>>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResponse {
    match state.tracker.update_settings(update).await {
        Ok(settings) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Settings updated", "settings": settings})),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": e.to_string()})),
        ),
    }
}

async fn metrics(State(state): State<Arc<ApiState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serialize `view` and prepend `"success": true`.
fn with_success<T: serde::Serialize>(view: &T) -> Value {
    let mut body = json!({"success": true});
    if let (Some(target), Ok(Value::Object(fields))) = (body.as_object_mut(), serde_json::to_value(view)) {
        target.extend(fields);
    }
    body
}
