/*!
 * Execution of a single work item.
 *
 * The executor checks that the item's page and language are configured,
 * then translates the page and every content record stored on it. The
 * outcome is reported as a boolean; problems that block the item are
 * written to its `last_error`.
 */

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;

use super::record::{RecordOutcome, RecordTranslator};
use crate::content::{ContentRepository, SiteConfig, SiteResolver, TableDescriptor};
use crate::database::models::WorkItem;
use crate::errors::TranslationError;

/// Message recorded when a fatal error aborts a work item
pub const FAILURE_TEMPLATE: &str =
    "Translation of page {page_id} into language {language_id} failed: {reason}";

/// Message recorded when no site owns the page
pub const NO_SITE_TEMPLATE: &str = "No site configuration for page {page_id}";

/// Message recorded when the site does not translate into the language
pub const LANGUAGE_NOT_ALLOWED_TEMPLATE: &str =
    "Target language {language_id} not in site languages of site {site}";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("Invalid placeholder regex"));

/// Replace `{name}` placeholders with values from `context`
///
/// Unknown placeholders are kept as they are.
pub fn interpolate(template: &str, context: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            context
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Runs the translation of work items
pub struct TranslationExecutor {
    sites: Arc<dyn SiteResolver>,
    content: Arc<dyn ContentRepository>,
    records: RecordTranslator,
    /// Registered translatable tables, pages first
    tables: Vec<TableDescriptor>,
}

impl TranslationExecutor {
    pub fn new(
        sites: Arc<dyn SiteResolver>,
        content: Arc<dyn ContentRepository>,
        records: RecordTranslator,
        tables: Vec<TableDescriptor>,
    ) -> Self {
        Self {
            sites,
            content,
            records,
            tables,
        }
    }

    /// Translate the page of a work item into its target language
    ///
    /// Returns true when the item was processed. Blocking problems, including
    /// records the provider left untranslated, set `item.last_error` and
    /// return false. A page that no longer exists returns false without
    /// an error.
    pub async fn translate(&self, item: &mut WorkItem) -> bool {
        match self.try_translate(item).await {
            Ok(done) => done,
            Err(e) => {
                let context = item_context(item, [("reason", e.to_string())]);
                item.last_error = interpolate(FAILURE_TEMPLATE, &context);
                error!("Work item {}: {}", item.id, item.last_error);
                false
            }
        }
    }

    async fn try_translate(&self, item: &mut WorkItem) -> Result<bool, TranslationError> {
        let Some(site) = self.sites.site_for_page(item.page_id).await? else {
            item.last_error = interpolate(NO_SITE_TEMPLATE, &item_context(item, []));
            warn!("Work item {}: {}", item.id, item.last_error);
            return Ok(false);
        };

        if site.target_language(item.target_language_id).is_none() {
            let context = item_context(item, [("site", site.identifier.clone())]);
            item.last_error = interpolate(LANGUAGE_NOT_ALLOWED_TEMPLATE, &context);
            warn!("Work item {}: {}", item.id, item.last_error);
            return Ok(false);
        }

        if self.content.find_page(item.page_id).await?.is_none() {
            warn!(
                "Work item {}: page {} does not exist, skipping",
                item.id, item.page_id
            );
            return Ok(false);
        }

        info!(
            "Translating page {} into language {} ({} mode)",
            item.page_id, item.target_language_id, item.mode
        );

        let mut incomplete = 0;
        for table in self.tables.iter().filter(|t| site.is_table_enabled(&t.name)) {
            incomplete += self.translate_table(item, table, &site).await?;
        }

        if incomplete > 0 {
            return Err(TranslationError::Incomplete(format!(
                "{} record(s) could not be fully translated",
                incomplete
            )));
        }

        Ok(true)
    }

    /// Translate the records of one table, returning how many stayed incomplete
    async fn translate_table(
        &self,
        item: &WorkItem,
        table: &TableDescriptor,
        site: &SiteConfig,
    ) -> Result<usize, TranslationError> {
        let languages = [item.target_language_id];

        let uids: Vec<i64> = if table.is_pages() {
            vec![item.page_id]
        } else {
            match self.content.records_on_page(&table.name, item.page_id).await {
                Ok(records) => records.into_iter().map(|r| r.uid).collect(),
                Err(e) => {
                    warn!(
                        "Failed to list {} records on page {}: {:#}",
                        table.name, item.page_id, e
                    );
                    return Ok(0);
                }
            }
        };

        debug!("{} {} record(s) on page {}", uids.len(), table.name, item.page_id);

        let mut incomplete = 0;
        for uid in uids {
            let outcomes = self
                .records
                .translate_record(table, uid, Some(languages.as_slice()), site, item.mode)
                .await?;
            if outcomes.iter().any(|(_, outcome)| *outcome == RecordOutcome::Incomplete) {
                incomplete += 1;
            }
        }

        Ok(incomplete)
    }
}

fn item_context<const N: usize>(
    item: &WorkItem,
    extra: [(&'static str, String); N],
) -> HashMap<&'static str, String> {
    let mut context = HashMap::from([
        ("page_id", item.page_id.to_string()),
        ("language_id", item.target_language_id.to_string()),
        ("item_id", item.id.to_string()),
    ]);
    context.extend(extra);
    context
}
