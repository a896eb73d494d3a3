use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use url::Url;

use crate::content::{SiteConfig, TableDescriptor};
use crate::database::DatabaseConnection;
use crate::language_utils;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// SQLite database file; empty means the platform data directory
    #[serde(default)]
    pub database_path: String,

    /// Batch run settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Translation provider settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Tables translated in addition to (or instead of) the core tables
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,

    /// Sites whose pages may be queued
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    #[default]
    DeepL,
    /// Offline provider prefixing texts with the target language
    Mock,
}

impl TranslationProvider {
    pub fn display_name(&self) -> &str {
        match self {
            Self::DeepL => "DeepL",
            Self::Mock => "Mock",
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeepL => write!(f, "deepl"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "deepl" => Ok(Self::DeepL),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Where cached translations live
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process memory, lost on exit
    Memory,
    /// The application database
    #[default]
    Sqlite,
}

/// Batch run settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchConfig {
    /// Work items taken per run
    #[serde(default = "default_batch_limit")]
    pub limit: usize,

    /// Lifetime of the queue lock of a run
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Pause between runs in loop mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            limit: default_batch_limit(),
            lock_ttl_secs: default_lock_ttl_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Translation cache settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Lifetime of a cache entry
    #[serde(default = "default_cache_lifetime_secs")]
    pub lifetime_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            backend: CacheBackendKind::default(),
            lifetime_secs: default_cache_lifetime_secs(),
        }
    }
}

/// Translation provider settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Provider API key, used when a site does not bring its own
    #[serde(default)]
    pub api_key: String,

    /// API endpoint; empty selects the provider default
    #[serde(default)]
    pub endpoint: String,

    /// Timeout of one provider request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a rate limit response
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            api_key: String::new(),
            endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_batch_limit() -> usize {
    10
}

fn default_lock_ttl_secs() -> u64 {
    3600
}

fn default_interval_secs() -> u64 {
    300
}

fn default_cache_lifetime_secs() -> u64 {
    7 * 24 * 3600
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load the configuration from `path`, writing a default file when missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Configuration file not found, creating default at: {}", path.display());
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).context("Failed to serialize default config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;

        Ok(config)
    }

    /// Database file to open, falling back to the platform data directory
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        if self.database_path.trim().is_empty() {
            DatabaseConnection::default_database_path()
        } else {
            Ok(PathBuf::from(&self.database_path))
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.batch.limit == 0 {
            return Err(anyhow!("Batch limit must be greater than zero"));
        }
        if self.batch.lock_ttl_secs == 0 {
            return Err(anyhow!("Lock TTL must be greater than zero"));
        }
        if self.cache.enabled && self.cache.lifetime_secs == 0 {
            return Err(anyhow!("Cache lifetime must be greater than zero"));
        }

        if !self.translation.endpoint.trim().is_empty() {
            Url::parse(&self.translation.endpoint)
                .with_context(|| format!("Invalid provider endpoint: {}", self.translation.endpoint))?;
        }

        let mut identifiers = HashSet::new();
        for site in &self.sites {
            if !identifiers.insert(site.identifier.as_str()) {
                return Err(anyhow!("Duplicate site identifier: {}", site.identifier));
            }
            self.validate_site(site)
                .with_context(|| format!("Invalid site '{}'", site.identifier))?;
        }

        // Sites without their own key fall back to the global one
        if self.translation.provider == TranslationProvider::DeepL && self.translation.api_key.is_empty() {
            let keyless = self
                .sites
                .iter()
                .find(|site| site.api_key.as_deref().is_none_or(str::is_empty));
            if self.sites.is_empty() || keyless.is_some() {
                return Err(anyhow!("Translation API key is required for DeepL provider"));
            }
        }

        for table in &self.tables {
            if table.name.trim().is_empty() {
                return Err(anyhow!("Table descriptors need a name"));
            }
        }

        Ok(())
    }

    fn validate_site(&self, site: &SiteConfig) -> Result<()> {
        if site.root_page_id <= 0 {
            return Err(anyhow!("Root page id must be positive"));
        }

        language_utils::validate_language_code(&site.default_language.iso_code)?;

        let mut ids = HashSet::new();
        for language in &site.languages {
            language_utils::validate_language_code(&language.iso_code)?;
            if language.id == site.default_language.id {
                return Err(anyhow!(
                    "Language {} is the default language and cannot be a target",
                    language.id
                ));
            }
            if !ids.insert(language.id) {
                return Err(anyhow!("Duplicate language id: {}", language.id));
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: String::new(),
            batch: BatchConfig::default(),
            cache: CacheConfig::default(),
            translation: TranslationConfig {
                provider: TranslationProvider::Mock,
                ..TranslationConfig::default()
            },
            tables: Vec::new(),
            sites: Vec::new(),
            log_level: LogLevel::default(),
        }
    }
}
