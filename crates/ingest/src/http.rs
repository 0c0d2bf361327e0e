use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use logdock_core::filter::LogCriteria;
use logdock_core::query::{ErrorResponse, HealthResponse};
use logdock_store::Store;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::broadcast::Broadcaster;
use crate::pipeline::{IngestError, Pipeline};
use crate::ws::ws_upgrade;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub pipeline: Pipeline,
    pub broadcaster: Broadcaster,
    pub ws_ping_interval: Duration,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/logs", get(query_logs).post(ingest_log).delete(reset_logs))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/ws", get(ws_upgrade))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::Rejected(reason) => {
                error_response(StatusCode::BAD_REQUEST, reason.to_string())
            }
            IngestError::Failed(_) | IngestError::Closed => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

async fn ingest_log(State(state): State<AppState>, body: Bytes) -> Response {
    let candidate = match serde_json::from_slice::<Value>(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "log ingest body is not valid JSON");
            return error_response(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}"));
        }
    };

    match state.pipeline.ingest(&candidate).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => {
            match &err {
                IngestError::Rejected(reason) => {
                    tracing::debug!(%reason, "log record rejected");
                }
                other => tracing::warn!(error = %other, "log ingest failed"),
            }
            err.into_response()
        }
    }
}

async fn query_logs(
    State(state): State<AppState>,
    Query(criteria): Query<LogCriteria>,
) -> Response {
    let records = state.store.query_logs(&criteria);
    tracing::debug!(count = records.len(), "log query served");
    Json(records).into_response()
}

async fn reset_logs(State(state): State<AppState>) -> Response {
    match state.pipeline.reset().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn status(State(state): State<AppState>) -> Response {
    let mut status = state.store.status();
    status.subscribers = state.broadcaster.subscriber_count();
    Json(status).into_response()
}
