/*!
 * Batch processing of queued work items.
 *
 * - `runner`: pulls eligible items, drives the executor and records statistics
 * - `lock`: the queue lock that keeps runs from overlapping
 */

pub mod lock;
pub mod runner;

pub use lock::{QUEUE_LOCK_NAME, QueueLock};
pub use runner::{BatchRunner, WorkItemExecutor};
