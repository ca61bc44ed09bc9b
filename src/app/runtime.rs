use super::{ShutdownReason, TrainerOrchestrator};
use crate::error::{EventBusError, Result, TrainerError};
use crate::events::{EventReceiver, TrainerEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl TrainerOrchestrator {
    /// Run until a signal or an operator requests shutdown
    pub async fn run(&mut self) -> Result<i32> {
        info!("Trainer is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| TrainerError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| TrainerError::system("Shutdown receiver already taken"))?;

        let shutdown_sender: ShutdownSender = Arc::new(Mutex::new(Some(shutdown_sender)));

        self.setup_signal_handlers(Arc::clone(&shutdown_sender));

        if let Some(requests) = self.shutdown_requests.take() {
            tokio::spawn(watch_shutdown_requests(
                requests,
                Arc::clone(&shutdown_sender),
                self.cancellation_token.child_token(),
            ));
        }

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| TrainerError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Trainer shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: ShutdownSender) {
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_reason(
                        &shutdown_sender_sigterm,
                        ShutdownReason::Signal("SIGTERM".to_string()),
                    )
                    .await;
                }
            });
        }

        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_reason(
                    &shutdown_sender,
                    ShutdownReason::Signal("SIGINT".to_string()),
                )
                .await;
            }
        });
    }
}

/// Forward [`TrainerEvent::ShutdownRequested`] from the bus to the run loop
async fn watch_shutdown_requests(
    mut requests: EventReceiver,
    shutdown_sender: ShutdownSender,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = requests.recv() => event,
        };

        match event {
            Ok(TrainerEvent::ShutdownRequested { reason, .. }) => {
                send_reason(&shutdown_sender, ShutdownReason::UserRequest(reason)).await;
                break;
            }
            Ok(_) => {}
            Err(EventBusError::Lagged { skipped }) => {
                debug!("Shutdown watcher skipped {} events", skipped);
            }
            Err(_) => break,
        }
    }
}

async fn send_reason(shutdown_sender: &ShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = shutdown_sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
