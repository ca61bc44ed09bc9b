mod frame_loop;
mod handle;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use frame_loop::{run_frame_loop, FrameLoopExit, FrameLoopReport};
pub use handle::{CaptureStatus, StatusReport, TrainerHandle};
pub use orchestrator::TrainerOrchestrator;
pub use types::{ComponentState, ShutdownReason};
