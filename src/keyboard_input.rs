use crate::app::TrainerHandle;
use crate::error::Result;
use crate::session::SessionMode;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Operator action bound to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    SetMode(SessionMode),
    StartSession,
    ResetTraining,
    EndSession,
    Quit,
}

impl KeyCommand {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('n') => Some(KeyCommand::SetMode(SessionMode::Normal)),
            KeyCode::Char('r') => Some(KeyCommand::SetMode(SessionMode::Recording)),
            KeyCode::Char('p') => Some(KeyCommand::SetMode(SessionMode::Rest)),
            KeyCode::Char('s') => Some(KeyCommand::StartSession),
            KeyCode::Char('x') => Some(KeyCommand::ResetTraining),
            KeyCode::Char('e') => Some(KeyCommand::EndSession),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
            _ => None,
        }
    }

    /// Apply the command to a running trainer
    pub fn apply(self, handle: &TrainerHandle) {
        match self {
            KeyCommand::SetMode(mode) => handle.set_mode(mode),
            KeyCommand::StartSession => {
                handle.start_session();
            }
            KeyCommand::ResetTraining => handle.reset_training(),
            KeyCommand::EndSession => {
                handle.end_session();
            }
            KeyCommand::Quit => handle.request_shutdown("User requested via keyboard"),
        }
    }
}

/// Raw-mode keyboard controls for the trainer
pub struct KeyboardInputHandler {
    handle: TrainerHandle,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(handle: TrainerHandle) -> Self {
        Self {
            handle,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Keyboard controls: n/r/p mode, s start, x reset, e end session, q quit");

        let handle = self.handle.clone();
        let cancellation_token = self.cancellation_token.clone();
        let runtime_handle = Handle::current();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(command) = KeyCommand::from_key(key_event.code) else {
                            debug!("Key pressed: {:?}", key_event.code);
                            continue;
                        };

                        debug!("Keyboard command: {:?}", command);
                        let handle = handle.clone();
                        runtime_handle.spawn(async move { command.apply(&handle) });

                        if command == KeyCommand::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the poll loop time to leave raw mode itself
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char('r')),
            Some(KeyCommand::SetMode(SessionMode::Recording))
        );
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char('p')),
            Some(KeyCommand::SetMode(SessionMode::Rest))
        );
        assert_eq!(
            KeyCommand::from_key(KeyCode::Char('s')),
            Some(KeyCommand::StartSession)
        );
        assert_eq!(KeyCommand::from_key(KeyCode::Esc), Some(KeyCommand::Quit));
        assert_eq!(KeyCommand::from_key(KeyCode::Char(' ')), None);
    }
}
