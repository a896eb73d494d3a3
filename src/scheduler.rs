/*!
 * Scheduler adapter for batch runs.
 *
 * The task is what an external scheduler (cron, systemd timer, the CLI's
 * loop mode) triggers. It also answers the operator's questions about the
 * queue: how far along it is and what the last run did.
 */

use anyhow::Result;
use chrono::Utc;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchRunner;
use crate::database::WorkItemStore;
use crate::database::models::RunStatistics;
use crate::errors::RunnerError;

/// Share of finished items in percent, rounded to two decimals
///
/// Finished means neither pending nor errored. An empty queue is complete.
pub fn compute_progress(total: u64, pending: u64, errored: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let done = total.saturating_sub(pending).saturating_sub(errored);
    let percent = done as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Periodically triggered batch run with operator reporting
pub struct SchedulerTask {
    runner: Arc<BatchRunner>,
    limit: usize,
}

impl SchedulerTask {
    pub fn new(runner: Arc<BatchRunner>, limit: usize) -> Self {
        Self { runner, limit }
    }

    fn store(&self) -> &Arc<dyn WorkItemStore> {
        self.runner.store()
    }

    /// Run one batch with the configured limit
    pub async fn execute(&self) -> Result<RunStatistics, RunnerError> {
        self.runner.process_batch(self.limit).await
    }

    /// Share of finished work items, see [`compute_progress`]
    pub async fn progress_percent(&self) -> Result<f64> {
        let store = self.store();
        let total = store.count_total().await?;
        let pending = store.count_pending(Utc::now()).await?;
        let errored = store.count_errored().await?;
        Ok(compute_progress(total, pending, errored))
    }

    /// Human readable summary of the queue and the last run
    pub async fn status_text(&self) -> Result<String> {
        let store = self.store();
        let total = store.count_total().await?;
        let pending = store.count_pending(Utc::now()).await?;
        let errored = store.count_errored().await?;

        let mut text = format!(
            "Work items: {} total, {} pending, {} errored ({:.2}% done)",
            total,
            pending,
            errored,
            compute_progress(total, pending, errored)
        );

        match store.last_run_statistics().await? {
            Some(stats) => {
                let minutes = (Utc::now() - stats.run_at).num_minutes().max(0);
                text.push_str(&format!(
                    "\nLast run {} minute(s) ago: {}",
                    minutes, stats
                ));
            }
            None => text.push_str("\nNo run recorded yet"),
        }

        Ok(text)
    }

    /// Run a batch every `interval` until `shutdown` completes
    ///
    /// Failed runs are logged and the loop keeps going.
    pub async fn run_periodically<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Running a batch every {} second(s)", interval.as_secs());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    match self.execute().await {
                        Ok(stats) => info!("Scheduled run done: {}", stats),
                        Err(RunnerError::AlreadyRunning(name)) => {
                            warn!("Skipping scheduled run, queue '{}' is busy", name)
                        }
                        Err(e) => error!("Scheduled run failed: {}", e),
                    }
                }
            }
        }
    }
}
