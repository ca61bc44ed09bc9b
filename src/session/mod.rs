mod context;
mod controller;
mod machine;
mod scheduler;

pub use context::{FrameOutcome, SessionSnapshot, SessionStats, TrainerSession};
pub use controller::SessionController;
pub use machine::{CountdownTick, SessionMode, SessionPhase, SessionStateMachine};
pub use scheduler::{TaskHandle, TaskScheduler};
