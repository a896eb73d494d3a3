/*!
 * Translation of a single content record.
 *
 * A default language record is translated into each requested language by
 * creating or refreshing its localization. Failures are contained here
 * unless the provider reports an error that affects every further request.
 */

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

use super::service::TranslationService;
use crate::content::{ContentRecord, ContentRepository, SiteConfig, TableDescriptor, slug};
use crate::database::models::TranslationMode;
use crate::errors::TranslationError;
use crate::providers::{
    OPTION_AUTH_KEY, OPTION_GLOSSARY_ID, OPTION_TAG_HANDLING, OPTION_TIMEOUT, TranslateOptions,
};

/// Translates records and writes the results into their localizations
#[derive(Clone)]
pub struct RecordTranslator {
    content: Arc<dyn ContentRepository>,
    service: TranslationService,
    /// Provider timeout passed with every request
    timeout_secs: u64,
}

/// What happened to one target language of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new localization was created and translated
    Created,
    /// An existing localization was re-translated
    Updated,
    /// Nothing had to be done
    Skipped,
    /// Some fields could not be translated, nothing was written
    Incomplete,
}

impl RecordTranslator {
    pub fn new(content: Arc<dyn ContentRepository>, service: TranslationService, timeout_secs: u64) -> Self {
        Self {
            content,
            service,
            timeout_secs,
        }
    }

    /// Provider options for requests made on behalf of `site`
    pub fn options_for(&self, site: &SiteConfig) -> TranslateOptions {
        let mut options = TranslateOptions::new();
        options.insert(OPTION_TIMEOUT.to_string(), self.timeout_secs.to_string());
        options.insert(OPTION_TAG_HANDLING.to_string(), "html".to_string());
        if let Some(key) = site.api_key.as_ref().filter(|k| !k.is_empty()) {
            options.insert(OPTION_AUTH_KEY.to_string(), key.clone());
        }
        if let Some(glossary) = site.active_glossary() {
            options.insert(OPTION_GLOSSARY_ID.to_string(), glossary.to_string());
        }
        options
    }

    /// Translate a record into `languages`, or into the languages the record
    /// selects itself when `languages` is `None`
    ///
    /// Returns the outcome per handled language. Only fatal provider errors
    /// are returned as errors. Untranslated texts yield
    /// `RecordOutcome::Incomplete`; everything else is logged.
    pub async fn translate_record(
        &self,
        table: &TableDescriptor,
        source_uid: i64,
        languages: Option<&[i64]>,
        site: &SiteConfig,
        mode: TranslationMode,
    ) -> Result<Vec<(i64, RecordOutcome)>, TranslationError> {
        let source = match self.content.find_record(&table.name, source_uid).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("Record {}:{} not found, skipping", table.name, source_uid);
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!("Failed to load record {}:{}: {:#}", table.name, source_uid, e);
                return Ok(Vec::new());
            }
        };

        if !source.is_original() || source.exclude_autotranslate {
            debug!(
                "Record {}:{} is a translation or excluded from auto translation",
                table.name, source_uid
            );
            return Ok(Vec::new());
        }

        let targets: Vec<i64> = match languages {
            Some(languages) => languages.to_vec(),
            None => source.autotranslate_languages.clone(),
        };

        let mut outcomes = Vec::with_capacity(targets.len());
        for language_id in targets {
            if language_id == source.language_id {
                continue;
            }

            match self.translate_into(table, &source, language_id, site, mode).await {
                Ok(outcome) => outcomes.push((language_id, outcome)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e @ TranslationError::Incomplete(_)) => {
                    warn!("Record {}:{} left untranslated: {}", table.name, source.uid, e);
                    outcomes.push((language_id, RecordOutcome::Incomplete));
                }
                Err(e) => {
                    warn!(
                        "Translation of {}:{} into language {} failed: {}",
                        table.name, source.uid, language_id, e
                    );
                }
            }
        }

        Ok(outcomes)
    }

    async fn translate_into(
        &self,
        table: &TableDescriptor,
        source: &ContentRecord,
        language_id: i64,
        site: &SiteConfig,
        mode: TranslationMode,
    ) -> Result<RecordOutcome, TranslationError> {
        let language = site.target_language(language_id).ok_or_else(|| {
            TranslationError::Record(format!(
                "Language {} is not a target language of site '{}'",
                language_id, site.identifier
            ))
        })?;

        let existing = self
            .content
            .find_translation(&table.name, source.uid, language_id)
            .await?;

        let existing = match existing {
            Some(_) if mode == TranslationMode::AddNew => return Ok(RecordOutcome::Skipped),
            Some(existing) if !is_stale(source, &existing) => return Ok(RecordOutcome::Skipped),
            other => other,
        };

        let source_code = site
            .default_language
            .source_code()
            .map_err(|e| TranslationError::Record(e.to_string()))?;
        let target_code = language
            .target_code()
            .map_err(|e| TranslationError::Record(e.to_string()))?;

        let values = source.field_values(&site.fields_for(table));
        let translated = self
            .service
            .translate_texts(&values, &source_code, &target_code, &self.options_for(site))
            .await?;

        // A partial result is not written, so the record stays stale
        if translated.len() < values.len() {
            return Err(TranslationError::Incomplete(format!(
                "{} of {} field(s) untranslated in language {}",
                values.len() - translated.len(),
                values.len(),
                language_id
            )));
        }

        let (mut translation, created) = match existing {
            Some(existing) => (existing, false),
            None => {
                let uid = self.content.localize(&table.name, source.uid, language_id).await?;
                let localized = self.content.find_record(&table.name, uid).await?.ok_or_else(|| {
                    TranslationError::Content(format!("Localized record {}:{} vanished", table.name, uid))
                })?;
                (localized, true)
            }
        };

        let now = Utc::now();
        translation.fields.extend(translated);
        translation.hidden = source.hidden;
        translation.last_autotranslated_at = Some(now);
        translation.modified_at = now;

        if created {
            slug::regenerate_slugs(self.content.as_ref(), &mut translation, &table.slug_fields, site.root_page_id)
                .await?;
        }

        self.content.update_record(&translation).await?;

        info!(
            "{} {}:{} in language {} ({} field(s))",
            if created { "Created translation of" } else { "Updated translation of" },
            table.name,
            source.uid,
            language_id,
            values.len()
        );

        Ok(if created { RecordOutcome::Created } else { RecordOutcome::Updated })
    }
}

/// Whether the source changed after the translation was last generated
pub fn is_stale(source: &ContentRecord, translation: &ContentRecord) -> bool {
    translation
        .last_autotranslated_at
        .is_none_or(|translated_at: DateTime<Utc>| source.modified_at > translated_at)
}
