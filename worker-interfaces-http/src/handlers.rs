use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::Utc;
use tracing::error;

use worker_application::AppState;

use crate::error::HttpError;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBody {
    status: &'static str,
    queue_lag: i64,
    time: String,
}

/// 200 with the visible backlog while the store answers, 503 otherwise.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthBody>, HttpError> {
    let queue_lag = state.queue_repo.queue_lag().await.map_err(|err| {
        error!(error = %err, "queue lag probe failed");
        HttpError::Unavailable(err.to_string())
    })?;
    Ok(Json(HealthBody {
        status: "ok",
        queue_lag,
        time: Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics_prometheus(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
        .into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", axum::routing::get(healthz))
        .route(
            "/metrics/prometheus",
            axum::routing::get(metrics_prometheus),
        )
        .with_state(state)
}
