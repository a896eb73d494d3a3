/*!
 * Repository layer for queue persistence.
 *
 * This module provides the work item store used by the batch runner,
 * the single-slot run statistics record and the queue lock that keeps
 * overlapping runs apart.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use rusqlite::{OptionalExtension, params};

use super::connection::DatabaseConnection;
use super::models::{
    Frequency, NewWorkItem, Priority, RunStatistics, TranslationMode, WorkItem,
    timestamp_to_datetime,
};

/// Persistent queue of work items as seen by the batch runner
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Eligible items, highest priority first, oldest due first within a priority
    async fn find_pending(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<WorkItem>>;

    /// Number of eligible items
    async fn count_pending(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Number of items that are not disabled
    async fn count_total(&self) -> Result<u64>;

    /// Number of enabled items carrying an error
    async fn count_errored(&self) -> Result<u64>;

    /// Persist `last_error`, `scheduled_at` and `completed_at` of an existing item
    async fn save(&self, item: &WorkItem) -> Result<()>;

    /// The snapshot written by the latest run
    async fn last_run_statistics(&self) -> Result<Option<RunStatistics>>;

    /// Overwrite the run snapshot
    async fn store_run_statistics(&self, stats: &RunStatistics) -> Result<()>;

    /// Take the named lock unless another owner holds an unexpired one
    async fn try_acquire_lock(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Release the named lock if `owner` holds it
    async fn release_lock(&self, name: &str, owner: &str) -> Result<()>;
}

const WORK_ITEM_COLUMNS: &str = "id, page_id, target_language_id, priority, mode, frequency, \
     scheduled_at, completed_at, last_error, disabled";

const ELIGIBLE_CONDITION: &str = "disabled = 0 AND last_error = '' AND scheduled_at < ?1 \
     AND (completed_at IS NULL OR scheduled_at > completed_at)";

fn parse_work_item_row(row: &rusqlite::Row) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: row.get(0)?,
        page_id: row.get(1)?,
        target_language_id: row.get(2)?,
        priority: Priority::from_rank(row.get(3)?),
        mode: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(TranslationMode::AddNew),
        frequency: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(Frequency::Once),
        scheduled_at: timestamp_to_datetime(row.get(6)?),
        completed_at: row.get::<_, Option<i64>>(7)?.map(timestamp_to_datetime),
        last_error: row.get(8)?,
        disabled: row.get::<_, i64>(9)? != 0,
    })
}

/// Repository for queue database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// The underlying connection, shared with the content store and cache
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Work Item Administration
    // =========================================================================

    /// Enqueue a new work item and return its id
    pub async fn insert_work_item(&self, item: &NewWorkItem) -> Result<i64> {
        let item = item.clone();
        let now = Utc::now().timestamp();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO work_items (
                        page_id, target_language_id, priority, mode, frequency,
                        scheduled_at, completed_at, last_error, disabled, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, '', 0, ?7)
                    "#,
                    params![
                        item.page_id,
                        item.target_language_id,
                        item.priority.rank(),
                        item.mode.to_string(),
                        item.frequency.to_string(),
                        item.scheduled_at.timestamp(),
                        now,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Get a work item by id, including disabled ones
    pub async fn get_work_item(&self, id: i64) -> Result<Option<WorkItem>> {
        self.db
            .execute_async(move |conn| {
                let item = conn
                    .query_row(
                        &format!("SELECT {} FROM work_items WHERE id = ?1", WORK_ITEM_COLUMNS),
                        [id],
                        parse_work_item_row,
                    )
                    .optional()?;
                Ok(item)
            })
            .await
    }

    /// Clear the error of an item so it becomes eligible again
    pub async fn clear_error(&self, id: i64) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE work_items SET last_error = '' WHERE id = ?1 AND disabled = 0",
                    [id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Enable or disable an item
    pub async fn set_disabled(&self, id: i64, disabled: bool) -> Result<bool> {
        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE work_items SET disabled = ?1 WHERE id = ?2",
                    params![disabled as i64, id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Errored items for operator inspection, most recently scheduled first
    pub async fn list_errored(&self, limit: usize) -> Result<Vec<WorkItem>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM work_items WHERE disabled = 0 AND last_error != '' \
                     ORDER BY scheduled_at DESC, id DESC LIMIT ?1",
                    WORK_ITEM_COLUMNS
                ))?;
                let items = stmt
                    .query_map([limit as i64], parse_work_item_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(items)
            })
            .await
    }

    async fn count_where(&self, condition: &'static str, now: Option<i64>) -> Result<u64> {
        self.db
            .execute_async(move |conn| {
                let sql = format!("SELECT COUNT(*) FROM work_items WHERE {}", condition);
                let count: i64 = match now {
                    Some(now) => conn.query_row(&sql, [now], |row| row.get(0))?,
                    None => conn.query_row(&sql, [], |row| row.get(0))?,
                };
                Ok(count.max(0) as u64)
            })
            .await
    }
}

#[async_trait]
impl WorkItemStore for Repository {
    async fn find_pending(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<WorkItem>> {
        let now = now.timestamp();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM work_items WHERE {} \
                     ORDER BY priority DESC, scheduled_at ASC, id ASC LIMIT ?2",
                    WORK_ITEM_COLUMNS, ELIGIBLE_CONDITION
                ))?;
                let items = stmt
                    .query_map(params![now, limit as i64], parse_work_item_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .context("Failed to read pending work items")?;
                Ok(items)
            })
            .await
    }

    async fn count_pending(&self, now: DateTime<Utc>) -> Result<u64> {
        self.count_where(ELIGIBLE_CONDITION, Some(now.timestamp())).await
    }

    async fn count_total(&self) -> Result<u64> {
        self.count_where("disabled = 0", None).await
    }

    async fn count_errored(&self) -> Result<u64> {
        self.count_where("disabled = 0 AND last_error != ''", None).await
    }

    async fn save(&self, item: &WorkItem) -> Result<()> {
        let item = item.clone();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE work_items
                    SET last_error = ?1, scheduled_at = ?2, completed_at = ?3
                    WHERE id = ?4 AND disabled = 0
                    "#,
                    params![
                        item.last_error,
                        item.scheduled_at.timestamp(),
                        item.completed_at.map(|c| c.timestamp()),
                        item.id,
                    ],
                )?;

                if changed == 0 {
                    let exists: bool = conn.query_row(
                        "SELECT COUNT(*) FROM work_items WHERE id = ?1",
                        [item.id],
                        |row| row.get(0),
                    )?;
                    if !exists {
                        return Err(anyhow!("Work item {} does not exist", item.id));
                    }
                    debug!("Work item {} is disabled, state not saved", item.id);
                }
                Ok(())
            })
            .await
    }

    async fn last_run_statistics(&self) -> Result<Option<RunStatistics>> {
        self.db
            .execute_async(|conn| {
                let stats = conn
                    .query_row(
                        "SELECT run_at, processed, succeeded, failed, remaining FROM run_statistics WHERE id = 1",
                        [],
                        |row| {
                            Ok(RunStatistics {
                                run_at: timestamp_to_datetime(row.get(0)?),
                                processed: row.get::<_, i64>(1)?.max(0) as u64,
                                succeeded: row.get::<_, i64>(2)?.max(0) as u64,
                                failed: row.get::<_, i64>(3)?.max(0) as u64,
                                remaining: row.get::<_, i64>(4)?.max(0) as u64,
                            })
                        },
                    )
                    .optional()?;
                Ok(stats)
            })
            .await
    }

    async fn store_run_statistics(&self, stats: &RunStatistics) -> Result<()> {
        let stats = stats.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO run_statistics (id, run_at, processed, succeeded, failed, remaining)
                    VALUES (1, ?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        stats.run_at.timestamp(),
                        stats.processed as i64,
                        stats.succeeded as i64,
                        stats.failed as i64,
                        stats.remaining as i64,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn try_acquire_lock(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let name = name.to_string();
        let owner = owner.to_string();
        let now = Utc::now();
        let expires_at = (now + ttl).timestamp();
        let now = now.timestamp();

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    "DELETE FROM queue_locks WHERE name = ?1 AND expires_at <= ?2",
                    params![name, now],
                )?;
                let inserted = tx.execute(
                    r#"
                    INSERT INTO queue_locks (name, owner, acquired_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(name) DO UPDATE SET expires_at = excluded.expires_at
                    WHERE queue_locks.owner = excluded.owner
                    "#,
                    params![name, owner, now, expires_at],
                )?;
                Ok(inserted > 0)
            })
            .await
    }

    async fn release_lock(&self, name: &str, owner: &str) -> Result<()> {
        let name = name.to_string();
        let owner = owner.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "DELETE FROM queue_locks WHERE name = ?1 AND owner = ?2",
                    params![name, owner],
                )?;
                Ok(())
            })
            .await
    }
}
