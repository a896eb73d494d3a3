use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{CacheBackendKind, Config, TranslationProvider};
use crate::batch::BatchRunner;
use crate::cache::{SqliteCacheBackend, TranslationCache};
use crate::content::{ConfiguredSiteResolver, ContentRepository, SiteResolver, SqliteContentRepository, TableDescriptor};
use crate::database::models::{NewWorkItem, RunStatistics, WorkItem};
use crate::database::{DatabaseConnection, Repository};
use crate::errors::RunnerError;
use crate::language_utils;
use crate::providers::{DeepLTranslator, MockTranslator, Translator};
use crate::scheduler::SchedulerTask;
use crate::translation::{RecordTranslator, RetryPolicy, TranslationExecutor, TranslationService};

/// Main application controller wiring the queue, cache and provider together
pub struct Controller {
    config: Config,
    repository: Repository,
    content: Arc<SqliteContentRepository>,
    sites: Arc<dyn SiteResolver>,
    cache: TranslationCache,
    scheduler: SchedulerTask,
}

impl Controller {
    /// Create a controller on the database configured in `config`
    pub fn with_config(config: Config, show_progress: bool) -> Result<Self> {
        let path = config.resolved_database_path()?;
        let db = DatabaseConnection::new(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::with_database(config, db, show_progress)
    }

    /// Create a controller on an already opened database
    pub fn with_database(config: Config, db: DatabaseConnection, show_progress: bool) -> Result<Self> {
        let repository = Repository::new(db.clone());
        let content = Arc::new(SqliteContentRepository::new(db.clone()));
        let content_dyn: Arc<dyn ContentRepository> = content.clone();
        let sites: Arc<dyn SiteResolver> =
            Arc::new(ConfiguredSiteResolver::new(config.sites.clone(), content_dyn.clone()));

        let cache = Self::build_cache(&config, &db);
        let translator = Self::build_translator(&config);
        let retry = RetryPolicy {
            retry_count: config.translation.retry_count,
            retry_backoff_ms: config.translation.retry_backoff_ms,
        };
        let service = TranslationService::new(translator, cache.clone(), retry);
        let records = RecordTranslator::new(content_dyn.clone(), service, config.translation.timeout_secs);
        let executor = TranslationExecutor::new(
            sites.clone(),
            content_dyn,
            records,
            TableDescriptor::registered(&config.tables),
        );

        let mut runner = BatchRunner::new(Arc::new(repository.clone()), Arc::new(executor))
            .with_lock_ttl(ChronoDuration::seconds(config.batch.lock_ttl_secs as i64));
        if show_progress {
            runner = runner.with_progress(ProgressBar::new(0));
        }
        let scheduler = SchedulerTask::new(Arc::new(runner), config.batch.limit);

        debug!(
            "Controller ready: provider {}, {} site(s), cache {}",
            config.translation.provider.display_name(),
            config.sites.len(),
            if cache.is_enabled() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            config,
            repository,
            content,
            sites,
            cache,
            scheduler,
        })
    }

    fn build_cache(config: &Config, db: &DatabaseConnection) -> TranslationCache {
        if !config.cache.enabled {
            return TranslationCache::disabled();
        }
        let lifetime = Duration::from_secs(config.cache.lifetime_secs);
        match config.cache.backend {
            CacheBackendKind::Memory => TranslationCache::in_memory(lifetime),
            CacheBackendKind::Sqlite => {
                TranslationCache::new(Arc::new(SqliteCacheBackend::new(db.clone())), lifetime, true)
            }
        }
    }

    fn build_translator(config: &Config) -> Arc<dyn Translator> {
        match config.translation.provider {
            TranslationProvider::DeepL => Arc::new(DeepLTranslator::new(
                config.translation.api_key.clone(),
                config.translation.endpoint.clone(),
                config.translation.timeout_secs,
            )),
            TranslationProvider::Mock => Arc::new(MockTranslator::working()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// CMS records, e.g. for importing pages
    pub fn content(&self) -> &SqliteContentRepository {
        &self.content
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &SchedulerTask {
        &self.scheduler
    }

    /// Run a single batch
    pub async fn run_once(&self) -> Result<RunStatistics, RunnerError> {
        self.scheduler.execute().await
    }

    /// Run batches at the configured interval until `shutdown` completes
    pub async fn run_loop<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.scheduler.run_periodically(interval, shutdown).await;
    }

    /// Queue and progress summary
    pub async fn status(&self) -> Result<String> {
        let db = self.repository.connection();
        Ok(format!(
            "{}\nDatabase: {} ({} bytes)",
            self.scheduler.status_text().await?,
            db.path().display(),
            db.file_size_bytes()
        ))
    }

    /// Queue a page for translation
    ///
    /// Pages outside every configured site are still queued; the run records
    /// the problem on the item.
    pub async fn enqueue(&self, item: NewWorkItem) -> Result<i64> {
        match self.sites.site_for_page(item.page_id).await? {
            Some(site) => match site.target_language(item.target_language_id) {
                Some(language) => debug!(
                    "Page {} of site '{}' will be translated into {}",
                    item.page_id,
                    site.identifier,
                    language_utils::get_language_name(&language.iso_code)
                        .unwrap_or_else(|_| language.iso_code.clone())
                ),
                None => warn!(
                    "Language {} is not a target of site '{}', the item will fail",
                    item.target_language_id, site.identifier
                ),
            },
            None => warn!("Page {} belongs to no configured site, the item will fail", item.page_id),
        }

        let id = self.repository.insert_work_item(&item).await?;
        info!(
            "Queued work item {} for page {} into language {} ({} priority)",
            id, item.page_id, item.target_language_id, item.priority
        );
        Ok(id)
    }

    /// Clear the error of a work item so it becomes eligible again
    pub async fn reset_error(&self, id: i64) -> Result<bool> {
        let reset = self.repository.clear_error(id).await?;
        if reset {
            info!("Cleared error of work item {}", id);
        } else {
            warn!("Work item {} not found", id);
        }
        Ok(reset)
    }

    /// Enable or disable a work item
    pub async fn set_disabled(&self, id: i64, disabled: bool) -> Result<bool> {
        self.repository.set_disabled(id, disabled).await
    }

    /// Items currently blocked by an error
    pub async fn errored_items(&self, limit: usize) -> Result<Vec<WorkItem>> {
        self.repository.list_errored(limit).await
    }

    /// Cache usage summary
    pub async fn cache_stats(&self) -> String {
        if !self.cache.is_enabled() {
            return "Translation cache is disabled".to_string();
        }
        format!(
            "Cache entries: {} ({} bytes), lifetime {} hour(s)",
            self.cache.entry_count().await,
            self.cache.size_bytes().await,
            self.cache.lifetime().as_secs() / 3600
        )
    }

    /// Remove every cache entry
    pub async fn flush_cache(&self) -> Result<()> {
        self.cache.flush().await?;
        info!("Translation cache flushed");
        Ok(())
    }

    /// Remove expired cache entries, returning how many were dropped
    pub async fn purge_cache(&self) -> Result<u64> {
        let purged = self.cache.purge_expired().await?;
        info!("Purged {} expired cache entr(y/ies)", purged);
        Ok(purged)
    }

    /// Schedule time of a new item due after `delay_minutes`
    pub fn schedule_time(delay_minutes: i64) -> chrono::DateTime<Utc> {
        Utc::now() + ChronoDuration::minutes(delay_minutes)
    }
}
