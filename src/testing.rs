//! In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::model::{MetadataRecord, RawCapture};
use crate::traits::{RecordSink, RetrievalError, RetrievalResponse, Retriever, SinkError};

/// Serves scripted responses per URL. Unknown URLs fail with a connection error.
#[derive(Default)]
pub struct ScriptedRetriever {
    responses: HashMap<String, (u16, Vec<u8>)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    last_headers: Mutex<Vec<(String, String)>>,
}

impl ScriptedRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), (200, body.as_bytes().to_vec()));
        self
    }

    pub fn with_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), (200, body));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), (status, Vec::new()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.last_headers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<RetrievalResponse, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock().unwrap() = headers.to_vec();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.get(url) {
            Some((status, body)) => Ok(RetrievalResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Err(RetrievalError::Connection(format!("no route to {}", url))),
        }
    }
}

/// Keeps appended rows in memory, keyed by table name.
#[derive(Default)]
pub struct MemorySink {
    pub captures: HashMap<String, Vec<RawCapture>>,
    pub records: HashMap<String, Vec<MetadataRecord>>,
}

impl RecordSink for MemorySink {
    fn append_captures(&mut self, table: &str, captures: &[RawCapture]) -> Result<usize, SinkError> {
        self.captures
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(captures);
        Ok(captures.len())
    }

    fn append_metadata(
        &mut self,
        table: &str,
        records: &[MetadataRecord],
    ) -> Result<usize, SinkError> {
        self.records
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }
}
