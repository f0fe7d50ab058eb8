//! Harvest pipeline orchestrator.
//!
//! This module provides the [`HarvestPipeline`] coordinator that runs the
//! stages in a fixed order:
//!
//! `Start → ListingFetched → ReferencesCollected → Deduplicated →
//! ItemsHarvested → MetadataExtracted → Persisted → Done`
//!
//! - Listing pages are fetched one at a time in page order
//! - Item pages are fetched concurrently through [`HarvesterExecutor`]
//! - Collection, deduplication and extraction run inline on the calling task
//! - A stage with empty output does not stop the run; later stages simply
//!   receive empty input

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::{ConfigError, HarvestConfig};
use crate::executor::HarvesterExecutor;
use crate::fetch::Fetcher;
use crate::harvest::collector::ReferenceCollector;
use crate::harvest::dedupe::Deduplicator;
use crate::harvest::extract::{missing_fields, MetadataExtractor};
use crate::harvest::traits::{ExtractError, HarvestStage};
use crate::model::{ItemReference, MetadataRecord, PageReference, RawCapture};
use crate::traits::{RecordSink, Retriever, SinkError};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Position of a run in the stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    ListingFetched,
    ReferencesCollected,
    Deduplicated,
    ItemsHarvested,
    MetadataExtracted,
    Persisted,
    Done,
}

/// Counts and timings of one run.
#[derive(Debug, Default, Clone)]
pub struct HarvestStats {
    pub listing_pages_fetched: usize,
    pub listing_pages_failed: usize,

    /// References found across all listing pages, duplicates included
    pub references_found: usize,
    pub unique_references: usize,

    pub items_fetched: usize,
    pub items_failed: usize,

    pub records_extracted: usize,
    pub items_dropped: usize,

    /// Extracted fields left empty, summed over all records
    pub empty_fields: usize,

    pub listing_rows_written: usize,
    pub metadata_rows_written: usize,

    pub listing_duration_ms: u64,
    pub harvest_duration_ms: u64,
    pub extraction_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a complete run.
#[derive(Debug)]
pub struct HarvestReport {
    pub records: Vec<MetadataRecord>,
    pub stats: HarvestStats,
    pub final_state: PipelineState,
}

/// Result of the discovery path.
#[derive(Debug, Default)]
pub struct Discovery {
    pub references: Vec<ItemReference>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that stop a run. Fetch and extraction failures are never among them.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build markup rules: {0}")]
    Rules(#[from] ExtractError),

    #[error("Failed to persist to '{table}': {source}")]
    Persist {
        table: String,
        #[source]
        source: SinkError,
    },
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Harvest pipeline over a retrieval collaborator and a record sink.
///
/// # Example
///
/// ```ignore
/// use paper_harvester::{HarvestConfig, HarvestPipeline, HttpRetriever, SqliteStore};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::open("jose.db")?;
///     let mut pipeline =
///         HarvestPipeline::new(HarvestConfig::default(), Arc::new(HttpRetriever::new()?), store)?;
///
///     let report = pipeline.run().await?;
///     println!("Extracted {} records", report.stats.records_extracted);
///     Ok(())
/// }
/// ```
pub struct HarvestPipeline<S>
where
    S: RecordSink,
{
    config: HarvestConfig,
    fetcher: Arc<Fetcher>,
    executor: HarvesterExecutor,
    collector: ReferenceCollector,
    deduplicator: Deduplicator,
    extractor: MetadataExtractor,
    sink: S,
}

impl<S> HarvestPipeline<S>
where
    S: RecordSink,
{
    /// Validates `config` and compiles the markup rules.
    pub fn new(
        config: HarvestConfig,
        retriever: Arc<dyn Retriever>,
        sink: S,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let collector =
            ReferenceCollector::new(&config.markup.card_class, config.item_url_prefix.clone())?;
        let extractor = MetadataExtractor::new(&config.markup)?;

        Ok(Self {
            fetcher: Arc::new(Fetcher::new(retriever, config.headers.clone())),
            executor: HarvesterExecutor::new(config.max_concurrency),
            collector,
            deduplicator: Deduplicator,
            extractor,
            sink,
            config,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs every stage and persists both record streams.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Persist`] if the sink rejects a write. Failed
    /// fetches and dropped items only show up in the report's stats.
    pub async fn run(&mut self) -> Result<HarvestReport, PipelineError> {
        let start = Instant::now();
        let mut stats = HarvestStats::default();
        let mut state = PipelineState::Start;

        // ====================================================================
        // Stage 1: Listing pages
        // ====================================================================

        info!(pages = self.config.total_pages, "Downloading listing pages");
        let listing_start = Instant::now();

        let pages = self.config.page_references();
        let (listings, failed) = self
            .fetch_listing_pages(&pages, self.config.listing_timeout())
            .await;
        stats.listing_pages_fetched = listings.len();
        stats.listing_pages_failed = failed;
        stats.listing_duration_ms = listing_start.elapsed().as_millis() as u64;
        state = advance(state, PipelineState::ListingFetched, listings.len());

        let table = self.config.listing_table.clone();
        stats.listing_rows_written = self
            .sink
            .append_captures(&table, &listings)
            .map_err(|source| PipelineError::Persist { table, source })?;

        // ====================================================================
        // Stage 2: Reference collection
        // ====================================================================

        let found = self.collect_references(listings);
        stats.references_found = found.len();
        state = advance(state, PipelineState::ReferencesCollected, found.len());

        // ====================================================================
        // Stage 3: Deduplication
        // ====================================================================

        let unique = run_stage(&self.deduplicator, found);
        stats.unique_references = unique.len();
        state = advance(state, PipelineState::Deduplicated, unique.len());

        // ====================================================================
        // Stage 4: Concurrent item harvest
        // ====================================================================

        let harvest_start = Instant::now();
        let outcome = self
            .executor
            .harvest(Arc::clone(&self.fetcher), unique, self.config.item_timeout())
            .await;
        stats.items_fetched = outcome.captures.len();
        stats.items_failed = outcome.failure_count();
        stats.harvest_duration_ms = harvest_start.elapsed().as_millis() as u64;
        state = advance(state, PipelineState::ItemsHarvested, outcome.captures.len());

        // ====================================================================
        // Stage 5: Metadata extraction
        // ====================================================================

        let extraction_start = Instant::now();
        let (records, dropped) = self.extract_all(outcome.captures);
        stats.records_extracted = records.len();
        stats.items_dropped = dropped;
        stats.empty_fields = records.iter().map(|r| missing_fields(r).len()).sum();
        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        state = advance(state, PipelineState::MetadataExtracted, records.len());

        // ====================================================================
        // Stage 6: Persistence
        // ====================================================================

        let table = self.config.metadata_table.clone();
        stats.metadata_rows_written = self
            .sink
            .append_metadata(&table, &records)
            .map_err(|source| PipelineError::Persist { table, source })?;
        state = advance(state, PipelineState::Persisted, stats.metadata_rows_written);

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        state = advance(state, PipelineState::Done, records.len());

        info!(
            listing_pages = stats.listing_pages_fetched,
            unique_references = stats.unique_references,
            items_fetched = stats.items_fetched,
            items_failed = stats.items_failed,
            records = stats.records_extracted,
            dropped = stats.items_dropped,
            duration_ms = stats.total_duration_ms,
            "Harvest completed"
        );

        Ok(HarvestReport {
            records,
            stats,
            final_state: state,
        })
    }

    /// Fetches the listing pages with the discovery timeout and returns the
    /// unique item references found on them. Nothing is persisted.
    pub async fn discover(&self) -> Discovery {
        info!("Scraping item references");
        let pages = self.config.page_references();
        let (listings, failed) = self
            .fetch_listing_pages(&pages, self.config.discovery_timeout())
            .await;
        let pages_fetched = listings.len();

        let found = self.collect_references(listings);
        let references = run_stage(&self.deduplicator, found);
        info!(unique = references.len(), "Total unique items found");

        Discovery {
            references,
            pages_fetched,
            pages_failed: failed,
        }
    }

    /// Fetches pages sequentially, in the order given.
    async fn fetch_listing_pages(
        &self,
        pages: &[PageReference],
        limit: Duration,
    ) -> (Vec<RawCapture>, usize) {
        let mut captures = Vec::with_capacity(pages.len());
        let mut failed = 0;

        for page in pages {
            info!(page = page.page_number, url = %page.url, "Fetching listing page");
            match self.fetcher.fetch(page, limit).await {
                Ok(capture) => captures.push(capture),
                Err(e) => {
                    warn!(page = page.page_number, "Failed to fetch listing page: {}", e);
                    failed += 1;
                }
            }
        }

        info!(
            fetched = captures.len(),
            failed, "Downloaded {} listing pages", captures.len()
        );
        (captures, failed)
    }

    fn collect_references(&self, listings: Vec<RawCapture>) -> Vec<ItemReference> {
        let mut found = Vec::new();
        for listing in listings {
            let page = listing.page_number;
            let refs = run_stage(&self.collector, listing);
            info!(page, found = refs.len(), "Found items on listing page");
            found.extend(refs);
        }
        found
    }

    fn extract_all(&self, captures: Vec<RawCapture>) -> (Vec<MetadataRecord>, usize) {
        let mut records = Vec::with_capacity(captures.len());
        let mut dropped = 0;

        for capture in captures {
            match self.extractor.execute(capture) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Failed to parse item: {}", e);
                    dropped += 1;
                }
            }
        }

        info!(records = records.len(), dropped, "Extracted item metadata");
        (records, dropped)
    }
}

/// Runs a stage that cannot fail.
fn run_stage<T>(stage: &T, input: T::Input) -> T::Output
where
    T: HarvestStage<Error = std::convert::Infallible>,
{
    match stage.execute(input) {
        Ok(output) => output,
        Err(never) => match never {},
    }
}

fn advance(from: PipelineState, to: PipelineState, produced: usize) -> PipelineState {
    info!(from = ?from, to = ?to, produced, "Stage transition");
    to
}

// ============================================================================
// Tests
// ============================================================================
