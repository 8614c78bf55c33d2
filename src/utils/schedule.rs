use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// When the first run of a periodic task happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRun {
    Immediately,
    AfterPeriod,
}

/// A spawned background task with its own cancellation handle.
///
/// The handle is a child of the token passed in, so cancelling the parent
/// stops every task while [`ScheduledTask::cancel`] stops just this one.
pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Runs `task` every `period`. A tick that fires while the previous run
    /// is still going is skipped, not queued.
    pub fn every<F, Fut>(
        name: &'static str,
        period: Duration,
        first_run: FirstRun,
        parent: &CancellationToken,
        mut task: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let start = match first_run {
                FirstRun::Immediately => Instant::now(),
                FirstRun::AfterPeriod => Instant::now() + period,
            };
            let mut interval = time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => task().await,
                }
            }
            tracing::debug!(task = name, "Scheduled task stopped");
        });

        Self {
            name,
            token,
            handle,
        }
    }

    /// Runs a long-lived future that is expected to watch the token itself.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let handle = tokio::spawn(task(token.clone()));
        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, error = %e, "Scheduled task panicked");
        }
    }
}
