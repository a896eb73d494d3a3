/*!
 * CMS content model and collaborators.
 *
 * This module contains:
 * - `ContentRecord`: a row of a translatable CMS table
 * - `TableDescriptor`: which tables are translated and which of their fields
 * - `ContentRepository`: access to records and their localizations
 * - `site`: resolution of the site configuration that owns a page
 * - `slug`: slug generation for newly localized records
 * - `sqlite`: the SQLite-backed content repository
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod site;
pub mod slug;
pub mod sqlite;

pub use site::{ConfiguredSiteResolver, SiteConfig, SiteLanguage, SiteResolver};
pub use sqlite::SqliteContentRepository;

/// Table holding the page tree
pub const PAGES_TABLE: &str = "pages";

/// Table holding the content elements of a page
pub const CONTENT_TABLE: &str = "tt_content";

/// Table holding file reference metadata (titles, alternative texts)
pub const FILE_REFERENCE_TABLE: &str = "sys_file_reference";

/// A record of a translatable table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Table the record belongs to
    pub table: String,
    pub uid: i64,
    /// Page the record is stored on; for pages the parent page
    pub pid: i64,
    /// Language of the record, 0 is the default language
    pub language_id: i64,
    /// Uid of the default language record, 0 for originals
    pub l10n_parent: i64,
    pub hidden: bool,
    pub deleted: bool,
    /// Last modification of the record
    pub modified_at: DateTime<Utc>,
    /// Last automatic translation of this (localized) record
    pub last_autotranslated_at: Option<DateTime<Utc>>,
    /// Opt-out flag set by editors
    pub exclude_autotranslate: bool,
    /// Languages the record asks to be translated into
    pub autotranslate_languages: Vec<i64>,
    /// Field values by field name
    pub fields: BTreeMap<String, String>,
}

impl ContentRecord {
    /// Create a visible default language record without field values
    pub fn new(table: &str, uid: i64, pid: i64) -> Self {
        Self {
            table: table.to_string(),
            uid,
            pid,
            language_id: 0,
            l10n_parent: 0,
            hidden: false,
            deleted: false,
            modified_at: Utc::now(),
            last_autotranslated_at: None,
            exclude_autotranslate: false,
            autotranslate_languages: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_languages(mut self, languages: Vec<i64>) -> Self {
        self.autotranslate_languages = languages;
        self
    }

    /// Whether this is a default language record
    pub fn is_original(&self) -> bool {
        self.l10n_parent == 0
    }

    /// Non-empty values of the given fields
    pub fn field_values(&self, fields: &[String]) -> BTreeMap<String, String> {
        fields
            .iter()
            .filter_map(|name| {
                self.fields
                    .get(name)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }
}

/// Scope in which a slug value has to be unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlugUniqueness {
    /// Unique among all records of the site
    Site,
    /// Unique among records on the same parent page
    Parent,
    /// Unique in the whole table
    Table,
}

/// A slug field and the fields it is generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugField {
    pub field: String,
    /// Fields joined into the slug, in order
    pub source_fields: Vec<String>,
    pub uniqueness: SlugUniqueness,
    /// Prefix the slug with `/`
    #[serde(default)]
    pub leading_slash: bool,
}

/// A translatable table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    /// Fields translated unless a site overrides them
    #[serde(default)]
    pub translatable_fields: Vec<String>,
    #[serde(default)]
    pub slug_fields: Vec<SlugField>,
}

impl TableDescriptor {
    pub fn new(name: &str, translatable_fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            translatable_fields: translatable_fields.iter().map(|f| f.to_string()).collect(),
            slug_fields: Vec::new(),
        }
    }

    pub fn with_slug(mut self, slug: SlugField) -> Self {
        self.slug_fields.push(slug);
        self
    }

    /// Whether the table is the page tree itself
    pub fn is_pages(&self) -> bool {
        self.name == PAGES_TABLE
    }

    /// The page table with its site-unique URL slug
    pub fn pages() -> Self {
        Self::new(PAGES_TABLE, &["title", "subtitle", "nav_title", "description", "abstract"]).with_slug(
            SlugField {
                field: "slug".to_string(),
                source_fields: vec!["title".to_string()],
                uniqueness: SlugUniqueness::Site,
                leading_slash: true,
            },
        )
    }

    pub fn tt_content() -> Self {
        Self::new(CONTENT_TABLE, &["header", "subheader", "bodytext"])
    }

    pub fn sys_file_reference() -> Self {
        Self::new(FILE_REFERENCE_TABLE, &["title", "alternative", "description"])
    }

    /// Core tables followed by `extra` tables not already present
    pub fn registered(extra: &[TableDescriptor]) -> Vec<TableDescriptor> {
        let mut tables = vec![Self::pages(), Self::tt_content(), Self::sys_file_reference()];
        for table in extra {
            match tables.iter_mut().find(|t| t.name == table.name) {
                Some(existing) => *existing = table.clone(),
                None => tables.push(table.clone()),
            }
        }
        tables
    }
}

/// Records a slug must not collide with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugScope {
    /// Records stored below the given site root page
    Site { root_page_id: i64 },
    /// Records on the given parent page
    Parent { pid: i64 },
    /// The whole table
    Table,
}

/// Access to CMS records and their localizations
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Default language page record, unless deleted
    async fn find_page(&self, page_id: i64) -> Result<Option<ContentRecord>>;

    /// Any record of a table, unless deleted
    async fn find_record(&self, table: &str, uid: i64) -> Result<Option<ContentRecord>>;

    /// Default language, non-deleted records stored on a page
    async fn records_on_page(&self, table: &str, page_id: i64) -> Result<Vec<ContentRecord>>;

    /// The localization of `source_uid` in `language_id`, unless deleted
    async fn find_translation(&self, table: &str, source_uid: i64, language_id: i64) -> Result<Option<ContentRecord>>;

    /// Create the localization of a record and return its uid
    async fn localize(&self, table: &str, source_uid: i64, language_id: i64) -> Result<i64>;

    /// Persist the fields and flags of an existing record
    async fn update_record(&self, record: &ContentRecord) -> Result<()>;

    /// Whether another record in `scope` with the same language uses `value`
    async fn slug_exists(
        &self,
        record: &ContentRecord,
        field: &str,
        value: &str,
        scope: SlugScope,
    ) -> Result<bool>;

    /// Page ids from `page_id` up to the tree root, starting with `page_id`
    async fn rootline(&self, page_id: i64) -> Result<Vec<i64>>;
}
