/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted queue state.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Work item priority, picked up in descending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric rank persisted in the `priority` column
    pub fn rank(self) -> i64 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Map a persisted rank back to a priority; unknown ranks read as medium
    pub fn from_rank(rank: i64) -> Self {
        match rank {
            i64::MIN..=1 => Priority::Low,
            2 => Priority::Medium,
            _ => Priority::High,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(anyhow::anyhow!("Invalid priority: {}", s)),
        }
    }
}

/// How existing translations are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    /// Only create translations that do not exist yet
    AddNew,
    /// Also refresh existing translations whose source changed
    OverwriteExisting,
}

impl fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationMode::AddNew => write!(f, "add_new"),
            TranslationMode::OverwriteExisting => write!(f, "overwrite_existing"),
        }
    }
}

impl std::str::FromStr for TranslationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add_new" | "add" => Ok(TranslationMode::AddNew),
            "overwrite_existing" | "overwrite" => Ok(TranslationMode::OverwriteExisting),
            _ => Err(anyhow::anyhow!("Invalid translation mode: {}", s)),
        }
    }
}

/// Recurrence of a work item. Stored only; re-scheduling happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Once => write!(f, "once"),
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "once" => Ok(Frequency::Once),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(anyhow::anyhow!("Invalid frequency: {}", s)),
        }
    }
}

/// A queued unit of translation work for one page and target language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Row identifier, owned by the store
    pub id: i64,
    /// Page whose content is translated
    pub page_id: i64,
    /// Target language identifier
    pub target_language_id: i64,
    pub priority: Priority,
    pub mode: TranslationMode,
    pub frequency: Frequency,
    /// Earliest execution time
    pub scheduled_at: DateTime<Utc>,
    /// Set when the item was translated successfully
    pub completed_at: Option<DateTime<Utc>>,
    /// Non-empty when the item failed; blocks pickup until cleared
    pub last_error: String,
    /// Soft delete flag
    pub disabled: bool,
}

impl WorkItem {
    /// Whether the item may be picked up at `now`
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        !self.disabled
            && self.last_error.is_empty()
            && self.scheduled_at < now
            && self.completed_at.is_none_or(|completed| self.scheduled_at > completed)
    }

    /// Whether the item carries an error
    pub fn is_errored(&self) -> bool {
        !self.last_error.is_empty()
    }
}

/// Parameters for enqueueing a new work item
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub page_id: i64,
    pub target_language_id: i64,
    pub priority: Priority,
    pub mode: TranslationMode,
    pub frequency: Frequency,
    pub scheduled_at: DateTime<Utc>,
}

impl NewWorkItem {
    /// Create parameters for a one-off medium priority item due at `scheduled_at`
    pub fn new(page_id: i64, target_language_id: i64, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            page_id,
            target_language_id,
            priority: Priority::Medium,
            mode: TranslationMode::AddNew,
            frequency: Frequency::Once,
            scheduled_at,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mode(mut self, mode: TranslationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
}

/// Snapshot of one batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// When the run finished
    pub run_at: DateTime<Utc>,
    /// Items taken from the queue
    pub processed: u64,
    /// Items translated successfully
    pub succeeded: u64,
    /// Items that failed
    pub failed: u64,
    /// Items still pending after the run
    pub remaining: u64,
}

impl RunStatistics {
    /// A run that found nothing to do
    pub fn empty(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            processed: 0,
            succeeded: 0,
            failed: 0,
            remaining: 0,
        }
    }

    /// Aggregate a run from its counts
    pub fn from_counts(run_at: DateTime<Utc>, pending_before: u64, processed: u64, succeeded: u64) -> Self {
        Self {
            run_at,
            processed,
            succeeded,
            failed: processed.saturating_sub(succeeded),
            remaining: pending_before.saturating_sub(processed),
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}, succeeded: {}, failed: {}, remaining: {}",
            self.processed, self.succeeded, self.failed, self.remaining
        )
    }
}

/// Convert unix seconds to a UTC timestamp, clamping invalid values to the epoch
pub fn timestamp_to_datetime(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}
