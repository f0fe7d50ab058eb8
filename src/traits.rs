use crate::model::{MetadataRecord, RawCapture};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`Retriever`] before any status code was seen.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Status and body returned by a [`Retriever`].
#[derive(Debug, Clone)]
pub struct RetrievalResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Low-level content retrieval (DNS, TLS, transport) sits behind this seam.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<RetrievalResponse, RetrievalError>;
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid table name: {0}")]
    InvalidTable(String),
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Append-only storage for the two record streams.
pub trait RecordSink: Send {
    /// Appends raw captures to `table`, returning the number of rows written.
    fn append_captures(&mut self, table: &str, captures: &[RawCapture]) -> Result<usize, SinkError>;

    /// Appends metadata records to `table`, returning the number of rows written.
    fn append_metadata(
        &mut self,
        table: &str,
        records: &[MetadataRecord],
    ) -> Result<usize, SinkError>;
}
