/*!
 * Database module for persistent queue state.
 *
 * This module provides SQLite-based persistence for:
 * - The translation work item queue
 * - The single-slot run statistics record
 * - The queue lock that keeps batch runs from overlapping
 *
 * The translation cache and the content store share the same connection.
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{Frequency, NewWorkItem, Priority, RunStatistics, TranslationMode, WorkItem};
pub use repository::{Repository, WorkItemStore};
