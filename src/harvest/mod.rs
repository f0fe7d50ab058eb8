//! Harvest module - listing discovery, item harvesting and metadata extraction.
//!
//! This module provides the stages of the harvest pipeline:
//! - **Traits**: [`HarvestStage`] shared by the pure stages
//! - **Collection**: [`ReferenceCollector`] finds item links on listing pages
//! - **Deduplication**: [`Deduplicator`] merges references by URL
//! - **Extraction**: [`MetadataExtractor`] applies per-field cascades
//! - **Pipeline**: the orchestrator via [`pipeline::HarvestPipeline`]

pub mod collector;
pub mod dedupe;
pub mod extract;
pub mod pipeline;
pub mod traits;

// Re-export commonly used types
pub use traits::{ExtractError, HarvestStage};

pub use collector::ReferenceCollector;
pub use dedupe::Deduplicator;
pub use extract::{Cascade, Field, MetadataExtractor};

pub use pipeline::{
    Discovery, HarvestPipeline, HarvestReport, HarvestStats, PipelineError, PipelineState,
};
