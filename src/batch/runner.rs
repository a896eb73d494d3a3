/*!
 * Batch processing of the work item queue.
 *
 * A run takes up to `limit` eligible items, translates them one after the
 * other and persists every item's new state as soon as it is known. The run
 * ends with a statistics snapshot that the scheduler reads.
 */

use async_trait::async_trait;
use chrono::{Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::sync::Arc;

use super::lock::{QUEUE_LOCK_NAME, QueueLock};
use crate::database::WorkItemStore;
use crate::database::models::{RunStatistics, WorkItem};
use crate::errors::RunnerError;
use crate::translation::TranslationExecutor;

/// Default lifetime of the queue lock
pub const DEFAULT_LOCK_TTL_SECS: i64 = 3600;

/// Executes a single work item
#[async_trait]
pub trait WorkItemExecutor: Send + Sync {
    /// Process `item`, returning true on success; may set `item.last_error`
    async fn execute(&self, item: &mut WorkItem) -> bool;
}

#[async_trait]
impl WorkItemExecutor for TranslationExecutor {
    async fn execute(&self, item: &mut WorkItem) -> bool {
        self.translate(item).await
    }
}

/// Runs batches of work items
pub struct BatchRunner {
    store: Arc<dyn WorkItemStore>,
    executor: Arc<dyn WorkItemExecutor>,
    lock_ttl: Duration,
    progress: Option<ProgressBar>,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn WorkItemStore>, executor: Arc<dyn WorkItemExecutor>) -> Self {
        Self {
            store,
            executor,
            lock_ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECS),
            progress: None,
        }
    }

    /// Set how long a lock of a crashed run blocks the queue
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Report per-item progress on a progress bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({percent}%) {msg}")
            .or_else(|_| {
                ProgressStyle::default_bar()
                    .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}")
            })
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress.set_style(style.progress_chars("█▓▒░"));
        self.progress = Some(progress);
        self
    }

    pub fn store(&self) -> &Arc<dyn WorkItemStore> {
        &self.store
    }

    /// Process up to `limit` eligible work items
    ///
    /// Fails only when another run holds the queue lock or the store is
    /// unavailable. Item failures are recorded on the items themselves.
    pub async fn process_batch(&self, limit: usize) -> Result<RunStatistics, RunnerError> {
        let lock = QueueLock::new(self.store.clone(), QUEUE_LOCK_NAME, self.lock_ttl);
        if !lock.acquire().await? {
            info!("Queue is locked by another run, skipping");
            return Err(RunnerError::AlreadyRunning(lock.name().to_string()));
        }

        let result = self.run(limit).await;
        lock.release().await;
        result
    }

    async fn run(&self, limit: usize) -> Result<RunStatistics, RunnerError> {
        let now = Utc::now();
        let pending_before = self.store.count_pending(now).await?;
        let items = self.store.find_pending(limit, now).await?;

        if items.is_empty() {
            debug!("No pending work items");
            let stats = RunStatistics::empty(Utc::now());
            self.store.store_run_statistics(&stats).await?;
            return Ok(stats);
        }

        info!(
            "Processing {} of {} pending work item(s)",
            items.len(),
            pending_before
        );
        if let Some(progress) = &self.progress {
            progress.set_length(items.len() as u64);
            progress.set_position(0);
        }

        let mut processed = 0u64;
        let mut succeeded = 0u64;

        for mut item in items {
            if let Some(progress) = &self.progress {
                progress.set_message(format!("page {} / language {}", item.page_id, item.target_language_id));
            }

            if self.executor.execute(&mut item).await {
                item.completed_at = Some(Utc::now());
                succeeded += 1;
            }
            self.store.save(&item).await?;
            processed += 1;

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        let stats = RunStatistics::from_counts(Utc::now(), pending_before, processed, succeeded);
        self.store.store_run_statistics(&stats).await?;

        if let Some(progress) = &self.progress {
            progress.finish_with_message(stats.to_string());
        }
        info!("Batch finished: {}", stats);

        Ok(stats)
    }
}
