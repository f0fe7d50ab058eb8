//! Item reference discovery on listing pages.

use scraper::{Html, Selector};
use tracing::debug;

use crate::harvest::traits::{compile, ExtractError, HarvestStage};
use crate::model::{ItemReference, RawCapture};

/// Finds item links inside card containers of a listing page.
pub struct ReferenceCollector {
    anchors: Selector,
    item_url_prefix: String,
}

impl ReferenceCollector {
    pub fn new(card_class: &str, item_url_prefix: impl Into<String>) -> Result<Self, ExtractError> {
        Ok(Self {
            anchors: compile(&format!(".{} a[href]", card_class))?,
            item_url_prefix: item_url_prefix.into(),
        })
    }

    /// Returns one reference per matching anchor, in document order, tagged
    /// with the capture's page number. Markup without cards yields nothing.
    pub fn collect(&self, capture: &RawCapture) -> Vec<ItemReference> {
        let document = Html::parse_document(&capture.text());

        let refs: Vec<ItemReference> = document
            .select(&self.anchors)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter(|href| href.starts_with(&self.item_url_prefix))
            .map(|href| ItemReference {
                url: href.to_string(),
                source_page: capture.page_number,
            })
            .collect();

        debug!(page = capture.page_number, found = refs.len(), "Collected references");
        refs
    }
}

impl HarvestStage for ReferenceCollector {
    type Input = RawCapture;
    type Output = Vec<ItemReference>;
    type Error = std::convert::Infallible;

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(self.collect(&input))
    }

    fn stage_name(&self) -> &'static str {
        "reference_collector"
    }
}
