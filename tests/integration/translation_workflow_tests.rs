/*!
 * End-to-end translation of queued pages
 */

use chrono::{Duration, Utc};

use autotranslate::cache::TranslationCache;
use autotranslate::content::{CONTENT_TABLE, ContentRepository, PAGES_TABLE, SiteLanguage};
use autotranslate::database::WorkItemStore;
use autotranslate::database::models::TranslationMode;
use autotranslate::providers::MockTranslator;

use crate::common::{FRENCH, GERMAN, TestEnv, due_item, test_site};

/// A queued page is translated together with the content on it
#[tokio::test]
async fn test_run_shouldTranslatePageAndContent() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    env.add_content(100, 1, "Welcome", "<p>Hello there</p>").await;
    let id = env.enqueue(due_item(1, GERMAN)).await;

    let stats = env.scheduler(10).execute().await.unwrap();

    assert_eq!((stats.processed, stats.succeeded), (1, 1));
    let item = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert!(item.completed_at.is_some());
    assert!(item.last_error.is_empty());

    let page = env.translation_of(PAGES_TABLE, 1, GERMAN).await.unwrap();
    assert_eq!(page.fields.get("title").map(String::as_str), Some("[DE] Home"));
    assert_eq!(page.fields.get("slug").map(String::as_str), Some("/de-home"));
    assert!(page.last_autotranslated_at.is_some());

    let content = env.translation_of(CONTENT_TABLE, 100, GERMAN).await.unwrap();
    assert_eq!(content.pid, 1);
    assert_eq!(content.fields.get("header").map(String::as_str), Some("[DE] Welcome"));
    assert_eq!(content.fields.get("bodytext").map(String::as_str), Some("[DE] <p>Hello there</p>"));
}

/// Translating the same page again makes no provider call
#[tokio::test]
async fn test_run_twice_shouldBeIdempotent() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    env.add_content(100, 1, "Welcome", "Body").await;
    env.enqueue(due_item(1, GERMAN)).await;
    env.scheduler(10).execute().await.unwrap();
    let calls = env.translator.call_count();
    let first = env.translation_of(CONTENT_TABLE, 100, GERMAN).await.unwrap();

    env.enqueue(due_item(1, GERMAN)).await;
    let stats = env.scheduler(10).execute().await.unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(env.translator.call_count(), calls);
    let second = env.translation_of(CONTENT_TABLE, 100, GERMAN).await.unwrap();
    assert_eq!(first.uid, second.uid);
    assert_eq!(first.fields, second.fields);
}

/// A fatal provider error blocks the item and leaves it uncompleted
#[tokio::test]
async fn test_run_withFatalProviderError_shouldRecordLastError() {
    let env = TestEnv::with(MockTranslator::unauthorized(), TranslationCache::disabled(), vec![test_site()]);
    env.add_page(1, 0, "Home").await;
    let id = env.enqueue(due_item(1, GERMAN)).await;

    let stats = env.scheduler(10).execute().await.unwrap();

    assert_eq!((stats.processed, stats.succeeded, stats.failed), (1, 0, 1));
    let item = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert!(item.completed_at.is_none());
    assert!(item.last_error.contains("page 1"));
    assert!(item.last_error.contains("Authentication error"));
    assert_eq!(env.repository.count_errored().await.unwrap(), 1);

    let again = env.scheduler(10).execute().await.unwrap();
    assert_eq!(again.processed, 0, "errored items are not picked up again");
}

/// A failed provider call leaves the item uncompleted with an error and writes nothing
#[tokio::test]
async fn test_run_withTransientProviderError_shouldRecordErrorAndLeaveItemUncompleted() {
    let env = TestEnv::with(MockTranslator::failing(), TranslationCache::disabled(), vec![test_site()]);
    env.add_page(1, 0, "Home").await;
    env.add_content(100, 1, "Welcome", "<p>Hello there</p>").await;
    let id = env.enqueue(due_item(1, GERMAN)).await;

    let stats = env.scheduler(10).execute().await.unwrap();

    assert_eq!((stats.processed, stats.succeeded, stats.failed), (1, 0, 1));
    let item = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert!(item.completed_at.is_none());
    assert_eq!(
        item.last_error,
        "Translation of page 1 into language 1 failed: \
         Incomplete translation: 2 record(s) could not be fully translated"
    );
    assert!(env.translation_of(PAGES_TABLE, 1, GERMAN).await.is_none());
    assert!(env.translation_of(CONTENT_TABLE, 100, GERMAN).await.is_none());

    // Once the error is cleared the item is picked up again
    assert!(env.repository.clear_error(id).await.unwrap());
    assert_eq!(env.repository.count_pending(Utc::now()).await.unwrap(), 1);
}

/// Text shared by two pages is sent to the provider once
#[tokio::test]
async fn test_run_withSharedText_shouldTranslateItOnce() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    env.add_page(2, 1, "About").await;
    env.add_content(100, 1, "Contact us", "Shared footer").await;
    env.add_content(200, 2, "Our story", "Shared footer").await;
    env.enqueue(due_item(1, GERMAN)).await;
    env.enqueue(due_item(2, GERMAN)).await;

    env.scheduler(10).execute().await.unwrap();

    let sent: Vec<String> = env.translator.requests().into_iter().flatten().collect();
    assert_eq!(sent.iter().filter(|text| *text == "Shared footer").count(), 1);
    let second = env.translation_of(CONTENT_TABLE, 200, GERMAN).await.unwrap();
    assert_eq!(second.fields.get("bodytext").map(String::as_str), Some("[DE] Shared footer"));
    assert_eq!(second.fields.get("header").map(String::as_str), Some("[DE] Our story"));
}

/// Pages outside every configured site fail with a message naming the page
#[tokio::test]
async fn test_run_withPageOutsideSites_shouldRecordNoSiteError() {
    let env = TestEnv::new();
    env.add_page(50, 0, "Orphan").await;
    let id = env.enqueue(due_item(50, GERMAN)).await;

    env.scheduler(10).execute().await.unwrap();

    let item = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert_eq!(item.last_error, "No site configuration for page 50");
    assert!(item.completed_at.is_none());
    assert_eq!(env.translator.call_count(), 0);
}

#[tokio::test]
async fn test_run_withLanguageOutsideSite_shouldRecordLanguageError() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    let id = env.enqueue(due_item(1, FRENCH)).await;

    env.scheduler(10).execute().await.unwrap();

    let item = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert_eq!(item.last_error, "Target language 2 not in site languages of site main");
    assert!(env.translation_of(PAGES_TABLE, 1, FRENCH).await.is_none());
}

/// A page missing from the content store fails the item silently, so it stays eligible
#[tokio::test]
async fn test_run_withMissingPage_shouldLeaveItemEligible() {
    let mut site = test_site();
    site.root_page_id = 77;
    let env = TestEnv::with(
        MockTranslator::working(),
        TranslationCache::in_memory(std::time::Duration::from_secs(60)),
        vec![site],
    );
    let id = env.enqueue(due_item(77, GERMAN)).await;

    let stats = env.scheduler(10).execute().await.unwrap();

    assert_eq!((stats.processed, stats.failed), (1, 1));
    let item = env.repository.get_work_item(id).await.unwrap().unwrap();
    assert!(item.last_error.is_empty());
    assert!(item.completed_at.is_none());
    assert_eq!(env.repository.count_pending(Utc::now()).await.unwrap(), 1);
}

/// Overwrite mode refreshes only translations whose source changed
#[tokio::test]
async fn test_overwriteMode_shouldOnlyRefreshStaleTranslations() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    let mut content = env.add_content(100, 1, "Welcome", "Body").await;
    env.enqueue(due_item(1, GERMAN)).await;
    env.scheduler(10).execute().await.unwrap();
    let calls = env.translator.call_count();

    env.enqueue(due_item(1, GERMAN).with_mode(TranslationMode::OverwriteExisting)).await;
    env.scheduler(10).execute().await.unwrap();
    assert_eq!(env.translator.call_count(), calls, "unchanged source is not retranslated");

    content.fields.insert("header".to_string(), "Welcome back".to_string());
    content.modified_at = Utc::now() + Duration::hours(1);
    env.content.insert_record(&content).await.unwrap();
    env.enqueue(due_item(1, GERMAN).with_mode(TranslationMode::OverwriteExisting)).await;
    env.scheduler(10).execute().await.unwrap();

    let translation = env.translation_of(CONTENT_TABLE, 100, GERMAN).await.unwrap();
    assert_eq!(translation.fields.get("header").map(String::as_str), Some("[DE] Welcome back"));
    assert!(env.translator.call_count() > calls);
}

/// A new page translation gets a unique slug within the site and language
#[tokio::test]
async fn test_slugRegeneration_shouldAvoidCollisions() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    env.add_page(2, 1, "Team").await;
    env.add_page(3, 1, "Team").await;
    env.enqueue(due_item(2, GERMAN)).await;
    env.enqueue(due_item(3, GERMAN)).await;

    env.scheduler(10).execute().await.unwrap();

    let first = env.translation_of(PAGES_TABLE, 2, GERMAN).await.unwrap();
    let second = env.translation_of(PAGES_TABLE, 3, GERMAN).await.unwrap();
    assert_eq!(first.fields.get("slug").map(String::as_str), Some("/de-team"));
    assert_eq!(second.fields.get("slug").map(String::as_str), Some("/de-team-1"));
}

/// Records excluded from auto translation are left alone
#[tokio::test]
async fn test_run_withExcludedRecord_shouldSkipIt() {
    let env = TestEnv::new();
    env.add_page(1, 0, "Home").await;
    let mut excluded = env.add_content(100, 1, "Legal", "Do not translate").await;
    excluded.exclude_autotranslate = true;
    env.content.insert_record(&excluded).await.unwrap();
    env.enqueue(due_item(1, GERMAN)).await;

    env.scheduler(10).execute().await.unwrap();

    assert!(env.translation_of(CONTENT_TABLE, 100, GERMAN).await.is_none());
    assert!(env.translation_of(PAGES_TABLE, 1, GERMAN).await.is_some());
}

/// A provider code override reaches the provider as target language
#[tokio::test]
async fn test_run_withProviderCodeOverride_shouldUseIt() {
    let site = test_site().with_language(SiteLanguage {
        id: 3,
        iso_code: "pt-BR".to_string(),
        provider_code: Some("pt-pt".to_string()),
    });
    let env = TestEnv::with(
        MockTranslator::working(),
        TranslationCache::in_memory(std::time::Duration::from_secs(60)),
        vec![site],
    );
    env.add_page(1, 0, "Home").await;
    env.enqueue(due_item(1, 3)).await;

    env.scheduler(10).execute().await.unwrap();

    let page = env.content.find_translation(PAGES_TABLE, 1, 3).await.unwrap().unwrap();
    assert_eq!(page.fields.get("title").map(String::as_str), Some("[PT-PT] Home"));
}
