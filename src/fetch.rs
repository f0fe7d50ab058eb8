use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::model::{Locator, RawCapture};
use crate::traits::{RetrievalError, Retriever};

/// Broad classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    Network,
    NonSuccess,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Fetch of {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
}

impl FetchError {
    pub fn kind(&self) -> FetchFailureKind {
        match self {
            FetchError::Status { .. } => FetchFailureKind::NonSuccess,
            FetchError::Network { .. } | FetchError::Timeout { .. } => FetchFailureKind::Network,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Timeout { url, .. } => url,
        }
    }
}

/// Single retrieval of one reference. Holds no mutable state, so one
/// instance is shared by every concurrent fetch task.
pub struct Fetcher {
    retriever: Arc<dyn Retriever>,
    headers: Vec<(String, String)>,
}

impl Fetcher {
    pub fn new(retriever: Arc<dyn Retriever>, headers: Vec<(String, String)>) -> Self {
        Self { retriever, headers }
    }

    /// Fetches `target`, returning its content tagged with the target's URL
    /// and page number. Anything but HTTP 200 is a failure; nothing is retried.
    #[instrument(skip(self, target), fields(url = %target.url(), page = target.page()))]
    pub async fn fetch<L>(&self, target: &L, limit: Duration) -> Result<RawCapture, FetchError>
    where
        L: Locator + ?Sized,
    {
        let url = target.url();

        // The retriever is given the timeout too; this bound holds even if it ignores it.
        let response = timeout(limit, self.retriever.get(url, &self.headers, limit))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: limit.as_secs(),
            })?
            .map_err(|e| match e {
                RetrievalError::Timeout(_) => FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: limit.as_secs(),
                },
                other => FetchError::Network {
                    url: url.to_string(),
                    message: other.to_string(),
                },
            })?;

        if response.status != 200 {
            warn!(status = response.status, "Non-success status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        debug!(bytes = response.body.len(), "Fetched");
        Ok(RawCapture {
            url: url.to_string(),
            content: response.body,
            page_number: target.page(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemReference, PageReference};
    use crate::testing::ScriptedRetriever;

    fn item(url: &str, page: u32) -> ItemReference {
        ItemReference {
            url: url.to_string(),
            source_page: page,
        }
    }

    #[tokio::test]
    async fn test_fetch_success_keeps_url_and_page() {
        let retriever = ScriptedRetriever::new().with_page("https://x/papers/1", "<p>hi</p>");
        let fetcher = Fetcher::new(Arc::new(retriever), vec![]);

        let capture = fetcher
            .fetch(&item("https://x/papers/1", 4), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(capture.url, "https://x/papers/1");
        assert_eq!(capture.page_number, 4);
        assert_eq!(capture.content, b"<p>hi</p>");
    }

    #[tokio::test]
    async fn test_non_200_is_failure() {
        let retriever = ScriptedRetriever::new().with_status("https://x/papers/1", 404);
        let fetcher = Fetcher::new(Arc::new(retriever), vec![]);

        let err = fetcher
            .fetch(&item("https://x/papers/1", 1), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FetchFailureKind::NonSuccess);
        assert_eq!(err.url(), "https://x/papers/1");
    }

    #[tokio::test]
    async fn test_other_success_codes_are_failures() {
        let retriever = ScriptedRetriever::new().with_status("https://x/papers/1", 204);
        let fetcher = Fetcher::new(Arc::new(retriever), vec![]);

        let result = fetcher
            .fetch(&item("https://x/papers/1", 1), Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(FetchError::Status { status: 204, .. })));
    }

    #[tokio::test]
    async fn test_unknown_url_is_network_failure() {
        let fetcher = Fetcher::new(Arc::new(ScriptedRetriever::new()), vec![]);
        let page = PageReference {
            url: "https://x/papers?page=1".to_string(),
            page_number: 1,
        };

        let err = fetcher.fetch(&page, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind(), FetchFailureKind::Network);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_retriever_times_out() {
        let retriever = ScriptedRetriever::new()
            .with_page("https://x/papers/1", "late")
            .with_delay(Duration::from_secs(120));
        let fetcher = Fetcher::new(Arc::new(retriever), vec![]);

        let err = fetcher
            .fetch(&item("https://x/papers/1", 1), Duration::from_secs(30))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { timeout_secs: 30, .. }));
        assert_eq!(err.kind(), FetchFailureKind::Network);
    }

    #[tokio::test]
    async fn test_headers_are_forwarded() {
        let retriever = Arc::new(ScriptedRetriever::new().with_page("https://x/papers/1", "ok"));
        let headers = vec![("User-Agent".to_string(), "test-agent".to_string())];
        let fetcher = Fetcher::new(retriever.clone(), headers.clone());

        fetcher
            .fetch(&item("https://x/papers/1", 1), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(retriever.last_headers(), headers);
    }
}
