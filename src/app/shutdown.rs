use super::{ComponentState, TrainerOrchestrator};
use crate::error::{Result, TrainerError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const KEYBOARD_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl TrainerOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Stops the frame loop, the control server and the shutdown watcher
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(keyboard_handler) = self.keyboard_handler.take() {
            if let Err(e) = self
                .stop_component("keyboard", KEYBOARD_STOP_TIMEOUT, keyboard_handler.stop())
                .await
            {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        #[cfg(feature = "http")]
        if let Some(server_task) = self.server_task.take() {
            let stop = async move {
                server_task
                    .await
                    .map_err(|e| TrainerError::component("server".to_string(), e.to_string()))
            };
            if let Err(e) = self.stop_component("server", TASK_STOP_TIMEOUT, stop).await {
                error!("Error stopping server: {}", e);
                exit_code = 1;
            }
        }

        if let Some(frame_loop) = self.frame_loop.take() {
            let stop = async move {
                let report = frame_loop
                    .await
                    .map_err(|e| TrainerError::component("pose".to_string(), e.to_string()))?;
                info!(
                    "Processed {} frames ({} pose source errors)",
                    report.frames, report.source_errors
                );
                Ok(())
            };
            if let Err(e) = self.stop_component("pose", TASK_STOP_TIMEOUT, stop).await {
                error!("Error stopping frame loop: {}", e);
                exit_code = 1;
            }
        }

        // Pending countdowns and status reverts
        let controller = self.controller.clone();
        let stop = async move {
            controller.shutdown();
            Ok(())
        };
        if let Err(e) = self.stop_component("session", TASK_STOP_TIMEOUT, stop).await {
            error!("Error stopping session: {}", e);
            exit_code = 1;
        }

        // Finishes a clip whose post-roll is still running
        let capture = std::sync::Arc::clone(&self.capture);
        let stop = async move {
            capture.stop().await;
            Ok(())
        };
        if let Err(e) = self
            .stop_component("capture", CAPTURE_STOP_TIMEOUT, stop)
            .await
        {
            error!("Error stopping capture: {}", e);
            exit_code = 1;
        }

        self.set_component_state("storage", ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop one component, bounded by `limit`
    async fn stop_component<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(TrainerError::component(
                    component.to_string(),
                    "stop timeout".to_string(),
                ))
            }
        }
    }
}
