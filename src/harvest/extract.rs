//! Metadata extraction from item pages.
//!
//! Each field is resolved by a [`Cascade`]: an ordered list of pure
//! strategies over the parsed document. A strategy returns `None` when its
//! rule does not apply and the cascade moves on; the first `Some` wins. A
//! field whose cascade finds nothing is an empty string.
//!
//! Most strategies only report non-empty values (see [`present`]). Two report
//! a value as soon as their markup exists, even if it is empty:
//! - the author metas: once any `citation_author` tag exists, the joined
//!   list is the answer and the `submitted_by` fallback is not consulted;
//! - the badge scan: the first non-language badge decides the status.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::MarkupConfig;
use crate::harvest::traits::{compile, ExtractError, HarvestStage};
use crate::model::{MetadataRecord, RawCapture};

/// Separator between author names.
pub const AUTHOR_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Authors,
    PublicationDate,
    Status,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Authors => "authors",
            Field::PublicationDate => "publication_date",
            Field::Status => "status",
        }
    }
}

/// Compiled selectors and markers the strategies read from.
pub struct Rules {
    title_meta: Selector,
    title_heading: Selector,
    document_title: Selector,
    title_separator: String,
    author_meta: Selector,
    submitted_by: Selector,
    date_meta: Selector,
    time_span: Selector,
    badges: Selector,
    language_badge_class: String,
}

impl Rules {
    pub fn new(markup: &MarkupConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            title_meta: compile(&format!(r#"meta[name="{}"]"#, markup.title_meta))?,
            title_heading: compile(&format!("h2.{}", markup.title_class))?,
            document_title: compile("title")?,
            title_separator: markup.title_separator.clone(),
            author_meta: compile(&format!(r#"meta[name="{}"]"#, markup.author_meta))?,
            submitted_by: compile(&format!("div.{}", markup.submitted_by_class))?,
            date_meta: compile(&format!(r#"meta[name="{}"]"#, markup.date_meta))?,
            time_span: compile(&format!("span.{}", markup.time_class))?,
            badges: compile(&format!("span.{}", markup.badge_class))?,
            language_badge_class: markup.language_badge_class.clone(),
        })
    }
}

pub type Strategy = fn(&Rules, &Html) -> Option<String>;

/// Ordered strategies for one field.
pub struct Cascade {
    pub field: Field,
    pub strategies: &'static [Strategy],
}

impl Cascade {
    pub fn resolve(&self, rules: &Rules, document: &Html) -> String {
        self.strategies
            .iter()
            .find_map(|strategy| strategy(rules, document))
            .unwrap_or_default()
    }
}

pub const TITLE: Cascade = Cascade {
    field: Field::Title,
    strategies: &[title_from_meta, title_from_heading, title_from_document],
};

pub const AUTHORS: Cascade = Cascade {
    field: Field::Authors,
    strategies: &[authors_from_metas, authors_from_submitted_by],
};

pub const PUBLICATION_DATE: Cascade = Cascade {
    field: Field::PublicationDate,
    strategies: &[date_from_meta, date_from_time_span],
};

pub const STATUS: Cascade = Cascade {
    field: Field::Status,
    strategies: &[status_from_badges],
};

/// Trimmed value, or `None` if nothing is left.
pub fn present(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| present(&text_of(el)))
}

fn first_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(present)
}

pub fn title_from_meta(rules: &Rules, document: &Html) -> Option<String> {
    first_content(document, &rules.title_meta)
}

pub fn title_from_heading(rules: &Rules, document: &Html) -> Option<String> {
    first_text(document, &rules.title_heading)
}

/// `<title>` text up to the separator, e.g. `"Foo · Journal"` gives `"Foo"`.
pub fn title_from_document(rules: &Rules, document: &Html) -> Option<String> {
    let full = first_text(document, &rules.document_title)?;
    if rules.title_separator.is_empty() {
        return Some(full);
    }
    full.split(rules.title_separator.as_str())
        .next()
        .and_then(present)
}

pub fn authors_from_metas(rules: &Rules, document: &Html) -> Option<String> {
    let tags: Vec<ElementRef<'_>> = document.select(&rules.author_meta).collect();
    if tags.is_empty() {
        return None;
    }

    let names: Vec<String> = tags
        .iter()
        .filter_map(|tag| tag.value().attr("content"))
        .filter_map(present)
        .collect();
    Some(names.join(AUTHOR_SEPARATOR))
}

pub fn authors_from_submitted_by(rules: &Rules, document: &Html) -> Option<String> {
    first_text(document, &rules.submitted_by)
}

pub fn date_from_meta(rules: &Rules, document: &Html) -> Option<String> {
    first_content(document, &rules.date_meta)
}

pub fn date_from_time_span(rules: &Rules, document: &Html) -> Option<String> {
    first_text(document, &rules.time_span)
}

pub fn status_from_badges(rules: &Rules, document: &Html) -> Option<String> {
    document
        .select(&rules.badges)
        .find(|badge| {
            !badge
                .value()
                .classes()
                .any(|class| class == rules.language_badge_class)
        })
        .map(|badge| text_of(badge).trim().to_lowercase())
}

/// Turns an item capture into a [`MetadataRecord`].
pub struct MetadataExtractor {
    rules: Rules,
}

impl MetadataExtractor {
    pub fn new(markup: &MarkupConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            rules: Rules::new(markup)?,
        })
    }

    /// Extracts every field. Fields that cannot be found are empty; only a
    /// capture that is not markup at all is rejected.
    pub fn extract(&self, capture: &RawCapture) -> Result<MetadataRecord, ExtractError> {
        if capture.content.contains(&0) {
            return Err(ExtractError::ItemDropped {
                url: capture.url.clone(),
                reason: "content is binary, not markup".to_string(),
            });
        }
        if std::str::from_utf8(&capture.content).is_err() {
            debug!(url = %capture.url, "Content is not valid UTF-8, decoding lossily");
        }

        let document = Html::parse_document(&capture.text());
        let record = MetadataRecord {
            url: capture.url.clone(),
            title: TITLE.resolve(&self.rules, &document),
            publication_date: PUBLICATION_DATE.resolve(&self.rules, &document),
            authors: AUTHORS.resolve(&self.rules, &document),
            status: STATUS.resolve(&self.rules, &document),
        };

        for field in missing_fields(&record) {
            debug!(url = %record.url, field = field.name(), "No value extracted");
        }
        Ok(record)
    }
}

/// Fields of `record` that ended up empty.
pub fn missing_fields(record: &MetadataRecord) -> Vec<Field> {
    [
        (Field::Title, &record.title),
        (Field::Authors, &record.authors),
        (Field::PublicationDate, &record.publication_date),
        (Field::Status, &record.status),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(field, _)| field)
    .collect()
}

impl HarvestStage for MetadataExtractor {
    type Input = RawCapture;
    type Output = MetadataRecord;
    type Error = ExtractError;

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.extract(&input)
    }

    fn stage_name(&self) -> &'static str {
        "metadata_extractor"
    }
}
