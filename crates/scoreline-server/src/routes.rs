//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use scoreline_core::{Error, ScoreResponse, ERROR_SENTINEL};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

/// Response header carrying the error kind when scoring fails
pub const ERROR_KIND_HEADER: &str = "x-scoreline-error";

pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/score", post(score))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Probe answered by the hosting platform's liveness check
async fn liveness() -> &'static str {
    "Healthy"
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// Score one raw request body.
///
/// Always answers 200 with a JSON body: the prediction, or `"error"`.
async fn score(State(state): State<AppState>, body: Bytes) -> Response {
    let scoring = state.scoring.clone();
    let response = match tokio::task::spawn_blocking(move || scoring.score_bytes(&body)).await {
        Ok(response) => response,
        Err(e) => {
            error!("Scoring task failed: {}", e);
            metrics::counter!("scoreline_errors_total", "kind" => "internal").increment(1);
            ScoreResponse::from_error(&Error::internal(format!("scoring task failed: {}", e)))
        }
    };
    score_response(&response)
}

fn score_response(response: &ScoreResponse) -> Response {
    let (body, kind) = match serde_json::to_vec(response) {
        Ok(body) => (body, response.error_kind()),
        Err(e) => {
            error!("Failed to serialize prediction: {}", e);
            let err = Error::from(e);
            (format!("\"{}\"", ERROR_SENTINEL).into_bytes(), Some(err.kind()))
        }
    };

    let mut res = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response();

    if let Some(kind) = kind {
        res.headers_mut()
            .insert(ERROR_KIND_HEADER, HeaderValue::from_static(kind));
    }
    res
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
