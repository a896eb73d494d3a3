/*!
 * Common test utilities for the autotranslate test suite
 */

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use autotranslate::batch::BatchRunner;
use autotranslate::cache::TranslationCache;
use autotranslate::content::{
    CONTENT_TABLE, ConfiguredSiteResolver, ContentRecord, ContentRepository, PAGES_TABLE, SiteConfig, SiteLanguage,
    SqliteContentRepository, TableDescriptor,
};
use autotranslate::database::models::NewWorkItem;
use autotranslate::database::{DatabaseConnection, Repository};
use autotranslate::providers::MockTranslator;
use autotranslate::scheduler::SchedulerTask;
use autotranslate::translation::{RecordTranslator, RetryPolicy, TranslationExecutor, TranslationService};

/// Language ids used by the test site
pub const ENGLISH: i64 = 0;
pub const GERMAN: i64 = 1;
pub const FRENCH: i64 = 2;

/// Root page of the test site
pub const ROOT_PAGE: i64 = 1;

/// Route crate logs to the test output, honouring `RUST_LOG`
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    std::fs::write(&file_path, content)?;
    Ok(file_path)
}

/// A site rooted at page 1, written in English and translated into German
pub fn test_site() -> SiteConfig {
    SiteConfig::new("main", ROOT_PAGE, SiteLanguage::new(ENGLISH, "en-US"))
        .with_language(SiteLanguage::new(GERMAN, "de-DE"))
}

/// Time `minutes` minutes ago
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

/// A due work item for `page_id` into `language_id`
pub fn due_item(page_id: i64, language_id: i64) -> NewWorkItem {
    NewWorkItem::new(page_id, language_id, minutes_ago(5))
}

/// Everything a batch run needs, on an in-memory database
pub struct TestEnv {
    pub db: DatabaseConnection,
    pub repository: Repository,
    pub content: Arc<SqliteContentRepository>,
    pub translator: MockTranslator,
    pub cache: TranslationCache,
    pub runner: Arc<BatchRunner>,
}

impl TestEnv {
    /// Environment with a working translator, an in-memory cache and the test site
    pub fn new() -> Self {
        Self::with(
            MockTranslator::working(),
            TranslationCache::in_memory(std::time::Duration::from_secs(3600)),
            vec![test_site()],
        )
    }

    pub fn with(translator: MockTranslator, cache: TranslationCache, sites: Vec<SiteConfig>) -> Self {
        init_test_logger();
        let db = DatabaseConnection::new_in_memory().expect("in-memory database");
        let repository = Repository::new(db.clone());
        let content = Arc::new(SqliteContentRepository::new(db.clone()));
        let content_dyn: Arc<dyn ContentRepository> = content.clone();

        let sites = Arc::new(ConfiguredSiteResolver::new(sites, content_dyn.clone()));
        let service = TranslationService::new(Arc::new(translator.clone()), cache.clone(), RetryPolicy::none());
        let records = RecordTranslator::new(content_dyn.clone(), service, 10);
        let executor = TranslationExecutor::new(sites, content_dyn, records, TableDescriptor::registered(&[]));
        let runner = Arc::new(BatchRunner::new(Arc::new(repository.clone()), Arc::new(executor)));

        Self {
            db,
            repository,
            content,
            translator,
            cache,
            runner,
        }
    }

    pub fn scheduler(&self, limit: usize) -> SchedulerTask {
        SchedulerTask::new(self.runner.clone(), limit)
    }

    /// Store a default language page
    pub async fn add_page(&self, uid: i64, pid: i64, title: &str) -> ContentRecord {
        let page = ContentRecord::new(PAGES_TABLE, uid, pid).with_field("title", title);
        self.content.insert_record(&page).await.expect("insert page");
        page
    }

    /// Store a default language content element on `page_id`
    pub async fn add_content(&self, uid: i64, page_id: i64, header: &str, bodytext: &str) -> ContentRecord {
        let record = ContentRecord::new(CONTENT_TABLE, uid, page_id)
            .with_field("header", header)
            .with_field("bodytext", bodytext);
        self.content.insert_record(&record).await.expect("insert content");
        record
    }

    /// The translation of a record into `language_id`
    pub async fn translation_of(&self, table: &str, uid: i64, language_id: i64) -> Option<ContentRecord> {
        self.content
            .find_translation(table, uid, language_id)
            .await
            .expect("find translation")
    }

    pub async fn enqueue(&self, item: NewWorkItem) -> i64 {
        self.repository.insert_work_item(&item).await.expect("insert work item")
    }
}
