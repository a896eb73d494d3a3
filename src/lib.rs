/*!
 * # Autotranslate - queued batch translation of CMS pages
 *
 * A Rust library that translates the content of CMS pages into the
 * languages configured for their site, driven by a persistent queue.
 *
 * ## Features
 *
 * - Work item queue with priorities, schedules and error tracking
 * - Batch runs guarded by an expiring queue lock
 * - Two-level translation cache (whole batch and single text)
 * - DeepL provider with rate limit backoff
 * - Localization of pages and records, including slug regeneration
 * - Progress and status reporting for schedulers
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Wires the components from a configuration
 * - `database`: SQLite persistence of the work item queue
 * - `batch`: Batch runs over the queue
 * - `scheduler`: Periodic runs and operator reporting
 * - `translation`: Translation of work items and records:
 *   - `translation::executor`: Checks and translates one work item
 *   - `translation::record`: Translates one record into a language
 *   - `translation::service`: Cache-aware provider calls
 * - `cache`: Translation cache and its backends
 * - `content`: CMS records, site configuration and slugs
 * - `providers`: Translation provider clients
 * - `language_utils`: Locale to provider code mapping
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod batch;
pub mod cache;
pub mod content;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod scheduler;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use batch::{BatchRunner, WorkItemExecutor};
pub use cache::TranslationCache;
pub use database::{Repository, WorkItemStore};
pub use errors::{ProviderError, RunnerError, TranslationError};
pub use scheduler::SchedulerTask;
pub use translation::{TranslationExecutor, TranslationService};
