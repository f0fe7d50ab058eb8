use crate::fetch::{FetchError, Fetcher};
use crate::model::{ItemReference, RawCapture};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Captures collected by one harvest, in completion order.
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub captures: Vec<RawCapture>,
    pub failures: Vec<FetchError>,
    /// Fetch tasks that panicked or were aborted
    pub aborted: usize,
}

impl HarvestOutcome {
    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.aborted
    }
}

/// Runs one fetch per reference with at most `concurrency_limit` in flight.
pub struct HarvesterExecutor {
    semaphore: Arc<Semaphore>,
    concurrency_limit: usize,
}

impl HarvesterExecutor {
    /// The limit is clamped to `1..=Semaphore::MAX_PERMITS`: zero would never
    /// make progress and larger values cannot back a semaphore.
    pub fn new(concurrency_limit: usize) -> Self {
        let concurrency_limit = concurrency_limit.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Fetches every reference. Failed fetches are reported in the outcome
    /// and never retried; the call itself cannot fail.
    #[instrument(skip(self, fetcher, refs), fields(items = refs.len(), max_in_flight = self.concurrency_limit))]
    pub async fn harvest(
        &self,
        fetcher: Arc<Fetcher>,
        refs: Vec<ItemReference>,
        limit: Duration,
    ) -> HarvestOutcome {
        let total = refs.len();
        let mut tasks = JoinSet::new();

        for (index, reference) in refs.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            let fetcher = Arc::clone(&fetcher);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only fails if it were.
                let _permit = semaphore.acquire_owned().await.ok();
                info!("Fetching {}/{}: {}", index + 1, total, reference.url);
                fetcher.fetch(&reference, limit).await
            });
        }

        let mut outcome = HarvestOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(capture)) => outcome.captures.push(capture),
                Ok(Err(e)) => {
                    warn!(url = %e.url(), "Failed to fetch: {}", e);
                    outcome.failures.push(e);
                }
                Err(e) => {
                    warn!("Fetch task did not complete: {}", e);
                    outcome.aborted += 1;
                }
            }
        }

        info!(
            fetched = outcome.captures.len(),
            failed = outcome.failure_count(),
            "Downloaded {} items successfully",
            outcome.captures.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRetriever;
    use std::collections::HashSet;

    fn refs(n: usize) -> Vec<ItemReference> {
        (0..n)
            .map(|i| ItemReference {
                url: format!("https://x/papers/{}", i),
                source_page: 1,
            })
            .collect()
    }

    fn retriever_for(refs: &[ItemReference]) -> ScriptedRetriever {
        refs.iter()
            .fold(ScriptedRetriever::new(), |r, item| r.with_page(&item.url, "<html></html>"))
    }

    #[tokio::test]
    async fn test_all_succeed_regardless_of_limit() {
        let n = 8;
        for limit in [1, n, 2 * n] {
            let items = refs(n);
            let retriever = Arc::new(retriever_for(&items));
            let fetcher = Arc::new(Fetcher::new(retriever, vec![]));

            let outcome = HarvesterExecutor::new(limit)
                .harvest(fetcher, items, Duration::from_secs(5))
                .await;

            assert_eq!(outcome.captures.len(), n, "limit {}", limit);
            assert_eq!(outcome.failure_count(), 0);

            let urls: HashSet<_> = outcome.captures.iter().map(|c| c.url.clone()).collect();
            assert_eq!(urls.len(), n);
        }
    }

    #[tokio::test]
    async fn test_failures_are_dropped_not_fatal() {
        let items = refs(10);
        let mut retriever = retriever_for(&items[..7]);
        retriever = retriever.with_status(&items[7].url, 500);
        // items 8 and 9 have no route at all
        let fetcher = Arc::new(Fetcher::new(Arc::new(retriever), vec![]));

        let outcome = HarvesterExecutor::new(3)
            .harvest(fetcher, items, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.captures.len(), 7);
        assert_eq!(outcome.failure_count(), 3);
    }

    #[tokio::test]
    async fn test_every_fetch_failing_yields_empty() {
        let fetcher = Arc::new(Fetcher::new(Arc::new(ScriptedRetriever::new()), vec![]));

        let outcome = HarvesterExecutor::new(4)
            .harvest(fetcher, refs(5), Duration::from_secs(5))
            .await;

        assert!(outcome.captures.is_empty());
        assert_eq!(outcome.failures.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let fetcher = Arc::new(Fetcher::new(Arc::new(ScriptedRetriever::new()), vec![]));
        let outcome = HarvesterExecutor::new(20)
            .harvest(fetcher, Vec::new(), Duration::from_secs(5))
            .await;
        assert!(outcome.captures.is_empty());
        assert_eq!(outcome.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let items = refs(12);
        let retriever =
            Arc::new(retriever_for(&items).with_delay(Duration::from_millis(20)));
        let fetcher = Arc::new(Fetcher::new(retriever.clone(), vec![]));

        let outcome = HarvesterExecutor::new(3)
            .harvest(fetcher, items, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.captures.len(), 12);
        assert!(retriever.max_in_flight() <= 3);
        assert_eq!(retriever.calls(), 12);
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        assert_eq!(HarvesterExecutor::new(0).concurrency_limit(), 1);
    }

    #[test]
    fn test_oversized_limit_is_clamped() {
        let executor = HarvesterExecutor::new(usize::MAX);
        assert_eq!(executor.concurrency_limit(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn test_capture_carries_source_page() {
        let items = vec![ItemReference {
            url: "https://x/papers/a".to_string(),
            source_page: 9,
        }];
        let fetcher = Arc::new(Fetcher::new(Arc::new(retriever_for(&items)), vec![]));

        let outcome = HarvesterExecutor::new(1)
            .harvest(fetcher, items, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.captures[0].page_number, 9);
    }
}
