use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Handle to a scheduled task
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Prevent any further runs of the task
    pub fn cancel(&self) {
        trace!("Cancelling scheduled task '{}'", self.name);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Spawns delayed and periodic callbacks that can be cancelled individually
/// or all at once through [`TaskScheduler::shutdown`]
#[derive(Clone, Default)]
pub struct TaskScheduler {
    root: CancellationToken,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once after `delay`
    pub fn schedule_after<F>(&self, name: &'static str, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.root.child_token();
        let task_token = token.clone();

        let join = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    trace!("Scheduled task '{}' cancelled before running", name);
                }
                _ = sleep(delay) => {
                    task();
                }
            }
        });

        TaskHandle { name, token, join }
    }

    /// Run `task` every `period`, first after one period, until it breaks
    pub fn schedule_every<F>(&self, name: &'static str, period: Duration, mut task: F) -> TaskHandle
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let token = self.root.child_token();
        let task_token = token.clone();

        let join = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        trace!("Periodic task '{}' cancelled", name);
                        break;
                    }
                    _ = ticker.tick() => {
                        if task().is_break() {
                            break;
                        }
                    }
                }
            }
        });

        TaskHandle { name, token, join }
    }

    /// Cancel every task spawned by this scheduler
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}
