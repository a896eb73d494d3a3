/*!
 * Full application lifecycle through the controller
 */

use autotranslate::app_config::{CacheBackendKind, Config, TranslationProvider};
use autotranslate::app_controller::Controller;
use autotranslate::content::{CONTENT_TABLE, ContentRecord, ContentRepository, PAGES_TABLE};
use autotranslate::database::models::{NewWorkItem, Priority};

use crate::common::{self, GERMAN};

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.database_path = dir.join("queue.db").to_string_lossy().to_string();
    config.translation.provider = TranslationProvider::Mock;
    config.cache.backend = CacheBackendKind::Sqlite;
    config.sites = vec![common::test_site()];
    config
}

/// Queue, run, inspect and reset through a file backed database
#[tokio::test]
async fn test_controller_lifecycle_withFileDatabase_shouldPersistAcrossInstances() {
    let dir = common::create_temp_dir().unwrap();
    let config = config_in(dir.path());
    assert!(config.validate().is_ok());

    {
        let controller = Controller::with_config(config.clone(), false).unwrap();
        controller
            .content()
            .insert_record(&ContentRecord::new(PAGES_TABLE, 1, 0).with_field("title", "Home"))
            .await
            .unwrap();
        controller
            .content()
            .insert_record(&ContentRecord::new(CONTENT_TABLE, 100, 1).with_field("header", "Welcome"))
            .await
            .unwrap();
        controller
            .enqueue(NewWorkItem::new(1, GERMAN, Controller::schedule_time(-1)).with_priority(Priority::High))
            .await
            .unwrap();

        let stats = controller.run_once().await.unwrap();
        assert_eq!((stats.processed, stats.succeeded), (1, 1));
        assert_eq!(controller.cache().entry_count().await, 2);
    }

    // A new process sees the same queue, translations and cache
    let controller = Controller::with_config(config, false).unwrap();
    let translation = controller
        .content()
        .find_translation(CONTENT_TABLE, 100, GERMAN)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(translation.fields.get("header").map(String::as_str), Some("[DE] Welcome"));

    let status = controller.status().await.unwrap();
    assert!(status.contains("1 total, 0 pending, 0 errored (100.00% done)"));
    assert!(status.contains("processed: 1, succeeded: 1, failed: 0, remaining: 0"));
    assert!(status.contains("queue.db ("));

    assert!(controller.cache_stats().await.starts_with("Cache entries: 2"));
    assert_eq!(controller.purge_cache().await.unwrap(), 0);
    controller.flush_cache().await.unwrap();
    assert_eq!(controller.cache().entry_count().await, 0);
}

#[test]
fn test_controller_resetError_shouldMakeItemEligibleAgain() {
    common::init_test_logger();
    let dir = common::create_temp_dir().unwrap();

    tokio_test::block_on(async {
        let controller = Controller::with_config(config_in(dir.path()), false).unwrap();
        let id = controller
            .enqueue(NewWorkItem::new(99, GERMAN, Controller::schedule_time(-1)))
            .await
            .unwrap();

        controller.run_once().await.unwrap();
        let errored = controller.errored_items(10).await.unwrap();
        assert_eq!(errored.len(), 1);
        assert_eq!(errored[0].last_error, "No site configuration for page 99");

        assert!(controller.reset_error(id).await.unwrap());
        assert!(controller.errored_items(10).await.unwrap().is_empty());
        assert!(controller.scheduler().progress_percent().await.unwrap() < 100.0);

        assert!(controller.set_disabled(id, true).await.unwrap());
        assert_eq!(controller.scheduler().progress_percent().await.unwrap(), 100.0);
    });
}
