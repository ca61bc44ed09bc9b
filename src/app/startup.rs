use super::frame_loop::{run_frame_loop, FrameLoopExit};
use super::{ComponentState, TrainerOrchestrator};
use crate::error::Result;
use crate::keyboard_input::KeyboardInputHandler;
use crate::storage::enforce_retention;
use tracing::{error, info, warn};

impl TrainerOrchestrator {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing trainer components");

        let mut states = self.component_states.lock().await;
        states.insert("storage".to_string(), ComponentState::Stopped);
        states.insert("capture".to_string(), ComponentState::Stopped);
        states.insert("session".to_string(), ComponentState::Stopped);
        states.insert("pose".to_string(), ComponentState::Stopped);

        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        #[cfg(feature = "http")]
        if self.config.server.enabled {
            states.insert("server".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all system components
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting trainer in {} mode", self.controller.mode());

        // Storage first so the retention cap holds before any new clip
        self.set_component_state("storage", ComponentState::Starting)
            .await;
        let retention =
            enforce_retention(self.store.as_ref(), self.config.capture.max_artifacts).await;
        if retention.artifacts_removed() > 0 {
            info!(
                "Removed {} stored clips over the cap of {}",
                retention.artifacts_removed(),
                self.config.capture.max_artifacts
            );
        }
        self.set_component_state("storage", ComponentState::Running)
            .await;

        self.set_component_state("capture", ComponentState::Starting)
            .await;
        self.capture.start().await.map_err(|e| {
            error!("Failed to start rolling capture: {}", e);
            e
        })?;
        if self.config.capture.enabled && self.capture.is_disabled() {
            self.controller.report_capture_unsupported();
        }
        self.set_component_state("capture", ComponentState::Running)
            .await;

        self.set_component_state("session", ComponentState::Running)
            .await;

        self.start_frame_loop().await;

        #[cfg(feature = "http")]
        if self.config.server.enabled {
            self.start_server().await;
        }

        if self.keyboard_enabled {
            self.set_component_state("keyboard", ComponentState::Starting)
                .await;

            let keyboard_handler = KeyboardInputHandler::new(self.handle());
            keyboard_handler.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;
            self.keyboard_handler = Some(keyboard_handler);

            self.set_component_state("keyboard", ComponentState::Running)
                .await;
        }

        info!("Trainer started successfully");
        Ok(())
    }

    async fn start_frame_loop(&mut self) {
        let Some(source) = self.pose_source.take() else {
            warn!("No pose source configured; hit detection is idle");
            return;
        };

        self.set_component_state("pose", ComponentState::Starting)
            .await;

        let controller = self.controller.clone();
        let handle = self.handle();
        let frame_interval = self.config.pose.frame_interval();
        let exit_on_end = self.config.pose.exit_on_end;
        let token = self.cancellation_token.child_token();

        self.frame_loop = Some(tokio::spawn(async move {
            let report = run_frame_loop(source, controller, frame_interval, token).await;
            if report.exit == FrameLoopExit::SourceEnded && exit_on_end {
                handle.request_shutdown("Pose source exhausted");
            }
            report
        }));

        self.set_component_state("pose", ComponentState::Running)
            .await;
    }

    #[cfg(feature = "http")]
    async fn start_server(&mut self) {
        use crate::server::ControlServer;

        self.set_component_state("server", ComponentState::Starting)
            .await;

        let server = ControlServer::new(self.config.server.clone(), self.handle());
        let token = self.cancellation_token.child_token();
        let component_states = std::sync::Arc::clone(&self.component_states);

        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = server.start(token).await {
                error!("Control server error: {}", e);
                component_states
                    .lock()
                    .await
                    .insert("server".to_string(), ComponentState::Failed);
            }
        }));

        self.set_component_state("server", ComponentState::Running)
            .await;
        info!(
            "Control server started on {}:{}",
            self.config.server.ip, self.config.server.port
        );
    }
}
