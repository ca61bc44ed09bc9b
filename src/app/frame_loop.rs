use crate::pose::PoseSource;
use crate::session::SessionController;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why the frame loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLoopExit {
    SourceEnded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLoopReport {
    pub exit: FrameLoopExit,
    pub frames: u64,
    pub source_errors: u64,
}

/// Pull pose estimates one at a time and feed them to the session
///
/// The next estimate is only requested after the previous frame has been
/// processed. Source errors count as a frame with nobody in it.
pub async fn run_frame_loop(
    mut source: Box<dyn PoseSource>,
    controller: SessionController,
    frame_interval: Duration,
    token: CancellationToken,
) -> FrameLoopReport {
    info!("Frame loop started on {}", source.source_name());

    let mut ticker = interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frames = 0u64;
    let mut source_errors = 0u64;

    let exit = loop {
        tokio::select! {
            _ = token.cancelled() => break FrameLoopExit::Cancelled,
            _ = ticker.tick() => {}
        }

        let estimate = tokio::select! {
            _ = token.cancelled() => break FrameLoopExit::Cancelled,
            estimate = source.next_poses() => estimate,
        };

        let poses = match estimate {
            Ok(Some(poses)) => poses,
            Ok(None) => break FrameLoopExit::SourceEnded,
            Err(e) => {
                source_errors += 1;
                warn!("Pose source {} failed: {}", source.source_name(), e);
                Vec::new()
            }
        };

        let outcome = controller.process_poses(&poses, Instant::now().into_std());
        frames += 1;
        debug!(
            "Frame {}: {:?} -> {:?}",
            frames, outcome.classification, outcome.judgement
        );
    };

    info!(
        "Frame loop stopped ({:?}) after {} frames, {} source errors",
        exit, frames, source_errors
    );

    FrameLoopReport {
        exit,
        frames,
        source_errors,
    }
}
