//! Cancellable fixed-interval job runner

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Work executed on every scheduler tick
#[async_trait::async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run_once(&self) -> Result<()>;
}

struct RunningTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs one job immediately on start and then once per interval.
///
/// A failing tick is logged and the schedule continues.
pub struct Scheduler {
    job: Arc<dyn PeriodicJob>,
    interval: Duration,
    task: Option<RunningTask>,
}

impl Scheduler {
    pub fn new(job: Arc<dyn PeriodicJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Spawn the loop; a no-op when already running
    pub fn start(&mut self) {
        if self.is_running() {
            warn!(job = self.job.name(), "Scheduler already running");
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(Arc::clone(&self.job), self.interval, rx));
        self.task = Some(RunningTask { shutdown, handle });

        info!(
            job = self.job.name(),
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );
    }

    /// Signal shutdown and wait for the loop, letting an in-flight tick finish
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            error!(job = self.job.name(), error = %e, "Scheduler task ended abnormally");
        }
        info!(job = self.job.name(), "Scheduler stopped");
    }
}

async fn run_loop(
    job: Arc<dyn PeriodicJob>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                debug!(job = job.name(), "Tick");
                if let Err(e) = job.run_once().await {
                    error!(job = job.name(), error = ?e, "Job tick failed");
                }
            }
        }
    }
}
