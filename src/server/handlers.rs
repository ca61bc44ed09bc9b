use crate::capture::ArtifactId;
use crate::error::StoreError;
use crate::session::SessionMode;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::str::FromStr;
use tracing::{debug, error};

use super::server::ServerState;

/// Error body returned by the control API
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => {
                error!("Artifact store request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let report = state.handle.status_report();

    let health_info = serde_json::json!({
        "status": "healthy",
        "mode": report.session.mode,
        "capture": report.capture.state,
        "server_info": {
            "subscribers": state.handle.event_bus().subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.handle.status_report())
}

pub async fn set_mode_handler(
    State(state): State<ServerState>,
    Path(mode): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = SessionMode::from_str(&mode).map_err(ApiError::bad_request)?;
    state.handle.set_mode(mode);
    Ok(Json(state.handle.status_report()))
}

/// 409 when the session cannot start in the current mode or phase
pub async fn start_session_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let started = state.handle.start_session();
    let status = if started {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(serde_json::json!({ "started": started })))
}

pub async fn reset_training_handler(State(state): State<ServerState>) -> impl IntoResponse {
    state.handle.reset_training();
    Json(state.handle.status_report())
}

pub async fn end_session_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let ended = state.handle.end_session();
    Json(serde_json::json!({ "ended": ended }))
}

pub async fn list_videos_handler(
    State(state): State<ServerState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.handle.list_videos().await?))
}

pub async fn get_video_handler(
    State(state): State<ServerState>,
    Path(id): Path<ArtifactId>,
) -> Result<impl IntoResponse, ApiError> {
    let (metadata, data) = state.handle.video(id).await?;
    debug!("Serving {} ({} bytes)", metadata.filename, data.len());

    Ok((
        [
            (header::CONTENT_TYPE, metadata.mime_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", metadata.filename),
            ),
        ],
        Bytes::from(data),
    ))
}

pub async fn delete_video_handler(
    State(state): State<ServerState>,
    Path(id): Path<ArtifactId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.handle.delete_video(id).await?))
}

pub async fn clear_videos_handler(
    State(state): State<ServerState>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.handle.clear_videos().await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
