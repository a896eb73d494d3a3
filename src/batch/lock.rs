/*!
 * Queue lock held for the duration of a batch run.
 */

use anyhow::Result;
use chrono::Duration;
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::WorkItemStore;

/// Name of the lock guarding the work item queue
pub const QUEUE_LOCK_NAME: &str = "autotranslate_queue";

/// A named lock owned by one runner instance
///
/// The lock expires after its TTL so that a crashed run cannot block the
/// queue forever.
pub struct QueueLock {
    store: Arc<dyn WorkItemStore>,
    name: String,
    owner: String,
    ttl: Duration,
}

impl QueueLock {
    /// Create a lock handle with a fresh owner id
    pub fn new(store: Arc<dyn WorkItemStore>, name: &str, ttl: Duration) -> Self {
        Self {
            store,
            name: name.to_string(),
            owner: Uuid::new_v4().to_string(),
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Try to take the lock; false when another owner holds it
    pub async fn acquire(&self) -> Result<bool> {
        let acquired = self.store.try_acquire_lock(&self.name, &self.owner, self.ttl).await?;
        if acquired {
            debug!("Acquired lock '{}' as {}", self.name, self.owner);
        }
        Ok(acquired)
    }

    /// Release the lock; failures are logged since the lock expires anyway
    pub async fn release(&self) {
        match self.store.release_lock(&self.name, &self.owner).await {
            Ok(()) => debug!("Released lock '{}'", self.name),
            Err(e) => warn!("Failed to release lock '{}': {:#}", self.name, e),
        }
    }
}
