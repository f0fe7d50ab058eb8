//! Core traits and error types for the harvest stages.
//!
//! Each pure stage of the pipeline (collection, deduplication, extraction)
//! implements [`HarvestStage`], so the orchestrator can run and log them the
//! same way and each can be tested on its own.

use thiserror::Error;

// ============================================================================
// Pipeline Trait
// ============================================================================

/// Generic pipeline stage that transforms Input → Output.
///
/// Stages are pure in-memory computations: they never block and never touch
/// the network. Running a stage twice on the same input yields the same
/// output.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so a pipeline can be moved
/// across tasks.
pub trait HarvestStage: Send + Sync {
    /// Input type consumed by this stage
    type Input;

    /// Output type produced by this stage
    type Output;

    /// Error type for stage failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes the stage.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for failures that exclude the whole input from the
    /// output. Partial failures are absorbed into the output.
    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Returns a human-readable name for this stage, used in logs.
    fn stage_name(&self) -> &'static str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building or running the markup stages.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The capture is not a markup document; the item is excluded.
    #[error("Item dropped ({url}): {reason}")]
    ItemDropped { url: String, reason: String },

    /// A configured class or attribute name does not form a valid selector.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Compiles a CSS selector, mapping the borrowed parser error into an owned one.
pub(crate) fn compile(selector: &str) -> Result<scraper::Selector, ExtractError> {
    scraper::Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_valid_selector() {
        assert!(compile("div.paper-card a[href]").is_ok());
    }

    #[test]
    fn test_compile_invalid_selector() {
        let err = compile("div..broken").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { .. }));
        assert!(err.to_string().contains("div..broken"));
    }
}
