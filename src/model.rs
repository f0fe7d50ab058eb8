use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Anything the fetcher can retrieve: a URL plus the page number it is tagged with.
pub trait Locator {
    fn url(&self) -> &str;
    fn page(&self) -> u32;
}

/// A listing page to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference {
    pub url: String,
    pub page_number: u32, // 1-based
}

/// A detail page discovered on a listing page.
///
/// Identity is the `url` alone: two references with the same URL but a
/// different `source_page` compare equal and hash identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReference {
    pub url: String,
    pub source_page: u32,
}

impl PartialEq for ItemReference {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for ItemReference {}

impl Hash for ItemReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl Locator for PageReference {
    fn url(&self) -> &str {
        &self.url
    }

    fn page(&self) -> u32 {
        self.page_number
    }
}

impl Locator for ItemReference {
    fn url(&self) -> &str {
        &self.url
    }

    fn page(&self) -> u32 {
        self.source_page
    }
}

/// Unparsed content fetched for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapture {
    pub url: String,
    pub content: Vec<u8>,
    pub page_number: u32,
}

impl RawCapture {
    /// Content decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Metadata derived from one item capture. Fields that could not be
/// extracted are empty strings, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub url: String,
    pub title: String,
    pub publication_date: String,
    pub authors: String,
    pub status: String,
}
