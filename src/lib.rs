pub mod config;
pub mod executor;
pub mod fetch;
pub mod harvest;
pub mod http;
pub mod model;
pub mod store;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use fetch::*;
pub use harvest::{HarvestPipeline, HarvestReport, HarvestStats, PipelineError};
pub use http::HttpRetriever;
pub use model::*;
pub use store::SqliteStore;
pub use traits::*;
