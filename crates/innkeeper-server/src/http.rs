//! HTTP surface: one resolution route plus a health probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use innkeeper::{Error, OwnershipResolver, Resolution, ResolutionRequest};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<OwnershipResolver>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/owners/resolve", post(resolve_owners))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn resolve_owners(
    State(state): State<AppState>,
    Json(request): Json<ResolutionRequest>,
) -> Result<Json<Resolution>, ApiError> {
    let resolution = state.resolver.resolve(request).await?;
    Ok(Json(resolution))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Fatal resolver errors mapped onto HTTP statuses.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::EnumUnavailable { .. } | Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Error::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self.0, status = %status, "resolution request failed");
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}
