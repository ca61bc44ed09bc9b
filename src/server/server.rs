use crate::{
    app::TrainerHandle,
    config::ServerConfig,
    error::{Result, TrainerError},
};
use axum::{
    routing::{get, post, put},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    clear_videos_handler, delete_video_handler, end_session_handler, get_video_handler,
    health_handler, list_videos_handler, reset_training_handler, set_mode_handler,
    start_session_handler, status_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) handle: TrainerHandle,
}

/// Build the control API routes around a trainer handle
pub fn build_router(handle: TrainerHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/mode/:mode", put(set_mode_handler))
        .route("/session/start", post(start_session_handler))
        .route("/session/reset", post(reset_training_handler))
        .route("/session/end", post(end_session_handler))
        .route("/videos", get(list_videos_handler).delete(clear_videos_handler))
        .route(
            "/videos/:id",
            get(get_video_handler).delete(delete_video_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(ServerState { handle })
}

/// HTTP control server for mode, session and video operations
pub struct ControlServer {
    pub(crate) config: ServerConfig,
    handle: TrainerHandle,
}

impl ControlServer {
    pub fn new(config: ServerConfig, handle: TrainerHandle) -> Self {
        Self { config, handle }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Serve until `shutdown` is cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let app = build_router(self.handle.clone());
        let addr = self.address();

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            TrainerError::component("control_server".to_string(), format!("bind {}: {}", addr, e))
        })?;

        info!("Control server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| {
                TrainerError::component("control_server".to_string(), format!("Server error: {}", e))
            })?;

        info!("Control server stopped");
        Ok(())
    }
}
