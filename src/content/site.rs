/*!
 * Site configuration and its resolution for a page.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ContentRepository, TableDescriptor};
use crate::language_utils;

/// A language configured for a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteLanguage {
    /// CMS language id
    pub id: i64,
    /// Locale such as `de-DE`
    pub iso_code: String,
    /// Provider code used instead of the derived one
    #[serde(default)]
    pub provider_code: Option<String>,
}

impl SiteLanguage {
    pub fn new(id: i64, iso_code: &str) -> Self {
        Self {
            id,
            iso_code: iso_code.to_string(),
            provider_code: None,
        }
    }

    /// Provider code when used as source language
    pub fn source_code(&self) -> Result<String> {
        match &self.provider_code {
            Some(code) => Ok(language_utils::split_locale(code).0.to_uppercase()),
            None => language_utils::to_source_code(&self.iso_code),
        }
    }

    /// Provider code when used as target language
    pub fn target_code(&self) -> Result<String> {
        match &self.provider_code {
            Some(code) => Ok(code.to_uppercase()),
            None => language_utils::to_target_code(&self.iso_code),
        }
    }
}

/// Translation settings of one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site identifier
    pub identifier: String,
    /// Root page of the site's page tree
    pub root_page_id: i64,
    /// Language the content is written in
    pub default_language: SiteLanguage,
    /// Languages content may be translated into
    #[serde(default)]
    pub languages: Vec<SiteLanguage>,
    /// API key overriding the provider's configured key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Tables translated for this site; empty means every registered table
    #[serde(default)]
    pub enabled_tables: Vec<String>,
    /// Translatable fields per table, overriding the table defaults
    #[serde(default)]
    pub translatable_fields: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub glossary_enabled: bool,
    #[serde(default)]
    pub glossary_id: Option<String>,
}

impl SiteConfig {
    pub fn new(identifier: &str, root_page_id: i64, default_language: SiteLanguage) -> Self {
        Self {
            identifier: identifier.to_string(),
            root_page_id,
            default_language,
            languages: Vec::new(),
            api_key: None,
            enabled_tables: Vec::new(),
            translatable_fields: BTreeMap::new(),
            glossary_enabled: false,
            glossary_id: None,
        }
    }

    pub fn with_language(mut self, language: SiteLanguage) -> Self {
        self.languages.push(language);
        self
    }

    /// A translation target language of the site
    pub fn target_language(&self, language_id: i64) -> Option<&SiteLanguage> {
        self.languages
            .iter()
            .find(|language| language.id == language_id && language.id != self.default_language.id)
    }

    /// Whether records of `table` are translated for this site
    pub fn is_table_enabled(&self, table: &str) -> bool {
        self.enabled_tables.is_empty() || self.enabled_tables.iter().any(|t| t == table)
    }

    /// Translatable fields of a table, honouring site overrides
    pub fn fields_for(&self, table: &TableDescriptor) -> Vec<String> {
        self.translatable_fields
            .get(&table.name)
            .cloned()
            .unwrap_or_else(|| table.translatable_fields.clone())
    }

    /// Glossary to apply, if enabled
    pub fn active_glossary(&self) -> Option<&str> {
        if self.glossary_enabled {
            self.glossary_id.as_deref()
        } else {
            None
        }
    }
}

/// Resolves the site configuration owning a page
#[async_trait]
pub trait SiteResolver: Send + Sync {
    /// The site of `page_id`, `None` when the page belongs to no configured site
    async fn site_for_page(&self, page_id: i64) -> Result<Option<SiteConfig>>;
}

/// Resolver over a fixed list of sites, matched by walking the page rootline
pub struct ConfiguredSiteResolver {
    sites: Vec<SiteConfig>,
    content: Arc<dyn ContentRepository>,
}

impl ConfiguredSiteResolver {
    pub fn new(sites: Vec<SiteConfig>, content: Arc<dyn ContentRepository>) -> Self {
        Self { sites, content }
    }
}

#[async_trait]
impl SiteResolver for ConfiguredSiteResolver {
    async fn site_for_page(&self, page_id: i64) -> Result<Option<SiteConfig>> {
        let rootline = self.content.rootline(page_id).await?;

        let site = rootline
            .iter()
            .find_map(|uid| self.sites.iter().find(|site| site.root_page_id == *uid));

        match site {
            Some(site) => {
                debug!("Page {} belongs to site '{}'", page_id, site.identifier);
                Ok(Some(site.clone()))
            }
            None => Ok(None),
        }
    }
}
