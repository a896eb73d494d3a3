/*!
 * Tests for application configuration functionality
 */

use autotranslate::app_config::{CacheBackendKind, Config, LogLevel, TranslationProvider};
use autotranslate::content::{SiteConfig, SiteLanguage};

use crate::common;

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.translation.provider, TranslationProvider::Mock);
    assert_eq!(config.translation.timeout_secs, 30);
    assert_eq!(config.translation.retry_count, 2);
    assert_eq!(config.batch.limit, 10);
    assert_eq!(config.batch.lock_ttl_secs, 3600);
    assert_eq!(config.cache.backend, CacheBackendKind::Sqlite);
    assert_eq!(config.cache.lifetime_secs, 7 * 24 * 3600);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.sites.is_empty());
}

/// Test configuration validation
#[test]
fn test_configValidation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.batch.limit = 0;
    assert!(config.validate().is_err());
    config.batch.limit = 5;

    config.translation.endpoint = "not a url".to_string();
    assert!(config.validate().is_err());
    config.translation.endpoint = "https://api-free.deepl.com".to_string();
    assert!(config.validate().is_ok());

    config.sites = vec![common::test_site(), common::test_site()];
    assert!(config.validate().is_err(), "duplicate site identifiers");

    config.sites = vec![SiteConfig::new("broken", 0, SiteLanguage::new(0, "en"))];
    assert!(config.validate().is_err(), "root page must be positive");
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("autotranslate.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.batch.limit, Config::default().batch.limit);
    let reloaded = Config::load_or_create(&path).unwrap();
    assert_eq!(reloaded.translation, config.translation);
}

#[test]
fn test_loadOrCreate_withExistingFile_shouldReadSitesAndTables() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "database_path": "/tmp/queue.db",
            "batch": { "limit": 3 },
            "cache": { "backend": "memory" },
            "translation": { "provider": "deepl", "api_key": "key:fx" },
            "tables": [ { "name": "tx_news", "translatable_fields": ["title", "teaser"] } ],
            "sites": [
                {
                    "identifier": "main",
                    "root_page_id": 1,
                    "default_language": { "id": 0, "iso_code": "en-US" },
                    "languages": [ { "id": 1, "iso_code": "de-DE" } ],
                    "glossary_enabled": true,
                    "glossary_id": "g-1"
                }
            ],
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.batch.limit, 3);
    assert_eq!(config.cache.backend, CacheBackendKind::Memory);
    assert_eq!(config.translation.provider, TranslationProvider::DeepL);
    assert_eq!(config.tables[0].translatable_fields, vec!["title", "teaser"]);
    assert_eq!(config.sites[0].active_glossary(), Some("g-1"));
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.resolved_database_path().unwrap().to_str(), Some("/tmp/queue.db"));
}

#[test]
fn test_loadOrCreate_withMalformedFile_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    assert!(Config::load_or_create(&path).is_err());
}
