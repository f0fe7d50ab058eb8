//! Run configuration for the harvest pipeline.
//!
//! Everything the original tool kept in module-level constants (URL
//! template, headers, timeouts, page count) lives in [`HarvestConfig`] and
//! is handed to the pipeline at construction.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::model::PageReference;

/// Placeholder substituted with the page number in `listing_url_template`.
pub const PAGE_PLACEHOLDER: &str = "{page}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Class and attribute names the collector and extractor look for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    pub card_class: String,
    pub title_meta: String,
    pub title_class: String,
    pub title_separator: String,
    pub author_meta: String,
    pub submitted_by_class: String,
    pub date_meta: String,
    pub time_class: String,
    pub badge_class: String,
    pub language_badge_class: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            card_class: "paper-card".to_string(),
            title_meta: "citation_title".to_string(),
            title_class: "paper-title".to_string(),
            title_separator: "·".to_string(),
            author_meta: "citation_author".to_string(),
            submitted_by_class: "submitted_by".to_string(),
            date_meta: "citation_publication_date".to_string(),
            time_class: "time".to_string(),
            badge_class: "badge".to_string(),
            language_badge_class: "badge-lang".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Listing page URL with a `{page}` placeholder
    pub listing_url_template: String,

    /// Only links starting with this prefix are item references
    pub item_url_prefix: String,

    /// Number of listing pages, fetched as pages `1..=total_pages`
    pub total_pages: u32,

    /// Maximum number of item fetches in flight
    pub max_concurrency: usize,

    pub listing_timeout_secs: u64,
    pub item_timeout_secs: u64,
    pub discovery_timeout_secs: u64,

    /// Request headers sent with every fetch
    pub headers: Vec<(String, String)>,

    pub listing_table: String,
    pub metadata_table: String,

    pub markup: MarkupConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url_template: "https://jose.theoj.org/papers?page={page}".to_string(),
            item_url_prefix: "https://jose.theoj.org/papers/".to_string(),
            total_pages: 12,
            max_concurrency: 20,
            listing_timeout_secs: 30,
            item_timeout_secs: 30,
            discovery_timeout_secs: 60,
            headers: vec![
                (
                    "User-Agent".to_string(),
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
                ),
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
            ],
            listing_table: "front_matter".to_string(),
            metadata_table: "metadata".to_string(),
            markup: MarkupConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Loads a config from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_total_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = total_pages;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_listing_url_template(mut self, template: impl Into<String>) -> Self {
        self.listing_url_template = template.into();
        self
    }

    pub fn with_item_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.item_url_prefix = prefix.into();
        self
    }

    /// Checks the values a run cannot proceed without.
    ///
    /// A page count of zero is accepted: the run completes with empty output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid(format!(
                "max_concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if !self.listing_url_template.contains(PAGE_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "listing_url_template must contain {}",
                PAGE_PLACEHOLDER
            )));
        }
        if self.listing_timeout_secs == 0
            || self.item_timeout_secs == 0
            || self.discovery_timeout_secs == 0
        {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn page_url(&self, page: u32) -> String {
        self.listing_url_template
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    /// Listing pages `1..=total_pages`, in page order.
    pub fn page_references(&self) -> Vec<PageReference> {
        (1..=self.total_pages)
            .map(|page_number| PageReference {
                url: self.page_url(page_number),
                page_number,
            })
            .collect()
    }
}
