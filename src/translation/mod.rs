/*!
 * Translation of work items.
 *
 * This module contains the translation pipeline of a work item, split into
 * several submodules:
 *
 * - `executor`: checks a work item and translates its page
 * - `record`: translates one record into its localizations
 * - `service`: cache-aware provider calls with rate limit backoff
 */

pub use self::executor::{TranslationExecutor, interpolate};
pub use self::record::{RecordOutcome, RecordTranslator};
pub use self::service::{RetryPolicy, TranslationService};

pub mod executor;
pub mod record;
pub mod service;
