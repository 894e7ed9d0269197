//! Metadata backfill
//!
//! Fetches full paper records for crawled ids the store does not have yet,
//! in bounded batches with linear retry and a cooldown between batches.

use citetree_common::config::FetcherConfig;
use citetree_common::db::models::Paper;
use citetree_common::errors::Result;
use citetree_common::metrics::record_backfill;
use citetree_common::scholar::PaperRecord;
use citetree_common::{Repository, ScholarClient};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Wait after failed attempt `attempt` (0-based): `(attempt + 1) * base`
pub fn retry_delay(attempt: u32, base: Duration) -> Duration {
    base * (attempt + 1)
}

/// Outcome of a backfill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Paper rows written
    pub fetched: u64,
    /// Ids whose batch failed every attempt
    pub failed: Vec<String>,
}

/// Backfills paper metadata for ids missing from the store
pub struct MetadataFetcher {
    repository: Repository,
    client: Arc<dyn ScholarClient>,
    config: FetcherConfig,
}

impl MetadataFetcher {
    pub fn new(repository: Repository, client: Arc<dyn ScholarClient>, config: FetcherConfig) -> Self {
        Self {
            repository,
            client,
            config,
        }
    }

    /// Fetch and store every id in `paper_ids` not already stored.
    ///
    /// Network failures never abort the backfill; exhausted batches are
    /// reported in [`FetchReport::failed`]. Storage errors propagate.
    #[instrument(skip_all, fields(requested = paper_ids.len()))]
    pub async fn fill_missing(&self, paper_ids: &BTreeSet<String>) -> Result<FetchReport> {
        let requested: Vec<String> = paper_ids.iter().cloned().collect();
        let existing = self.repository.existing_paper_ids(&requested).await?;
        let missing: Vec<String> = requested
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();

        let mut report = FetchReport::default();
        if missing.is_empty() {
            debug!("All papers already stored");
            return Ok(report);
        }

        let batch_size = self.config.effective_batch_size();
        let batches = missing.len().div_ceil(batch_size);
        info!(missing = missing.len(), batches, "Fetching paper metadata");

        for (index, batch) in missing.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.batch_cooldown()).await;
            }

            let Some(records) = self.fetch_batch(batch).await else {
                report.failed.extend(batch.iter().cloned());
                continue;
            };

            let papers: Vec<Paper> = records
                .into_iter()
                .flatten()
                .filter_map(PaperRecord::into_paper)
                .collect();
            let dropped = batch.len().saturating_sub(papers.len());

            if !papers.is_empty() {
                report.fetched += self.repository.upsert_papers(papers).await?;
            }
            debug!(batch = index + 1, batches, dropped, "Batch stored");
        }

        record_backfill(report.fetched as usize, report.failed.len());
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "Some papers could not be fetched");
        }
        info!(fetched = report.fetched, "Metadata backfill complete");
        Ok(report)
    }

    /// Records for one batch, or `None` once every attempt has failed
    async fn fetch_batch(&self, batch: &[String]) -> Option<Vec<Option<PaperRecord>>> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 0..max_attempts {
            match self.client.get_papers(batch).await {
                Ok(records) => return Some(records),
                Err(e) => {
                    let wait = retry_delay(attempt, self.config.retry_base());
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        size = batch.len(),
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Batch fetch failed"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citetree_common::scholar::{MockFailure, MockScholarClient};
    use citetree_common::DbPool;
    use std::time::Instant;

    fn fast_config() -> FetcherConfig {
        FetcherConfig {
            batch_cooldown_ms: 1,
            retry_base_ms: 1,
            ..FetcherConfig::default()
        }
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn setup(
        client: MockScholarClient,
        config: FetcherConfig,
    ) -> (MetadataFetcher, Repository, Arc<MockScholarClient>) {
        let repo = Repository::new(DbPool::in_memory().await.unwrap());
        let client = Arc::new(client);
        let fetcher = MetadataFetcher::new(repo.clone(), client.clone(), config);
        (fetcher, repo, client)
    }

    #[test]
    fn test_retry_delay_is_linear() {
        let base = Duration::from_secs(5);
        assert_eq!(retry_delay(0, base), Duration::from_secs(5));
        assert_eq!(retry_delay(1, base), Duration::from_secs(10));
        assert_eq!(retry_delay(2, base), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_fill_missing_skips_stored_and_reports_failures() {
        let client = MockScholarClient::new()
            .with_paper("A")
            .with_paper("B")
            .with_batch_failure("C", MockFailure::Unavailable);
        let config = FetcherConfig {
            batch_size: 1,
            ..fast_config()
        };
        let (fetcher, repo, client) = setup(client, config).await;

        let stored = Paper {
            title: Some("Stored earlier".to_string()),
            ..PaperRecord::with_id("A").into_paper().unwrap()
        };
        repo.upsert_papers(vec![stored]).await.unwrap();

        let report = fetcher.fill_missing(&ids(&["A", "B", "C"])).await.unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(report.failed, vec!["C".to_string()]);
        assert!(repo.find_paper("B").await.unwrap().is_some());
        assert!(repo.find_paper("C").await.unwrap().is_none());

        // A is never requested, C is tried three times
        let requests = client.batch_requests();
        assert!(requests.iter().all(|batch| !batch.contains(&"A".to_string())));
        assert_eq!(requests.iter().filter(|b| b.contains(&"C".to_string())).count(), 3);
        assert_eq!(
            repo.find_paper("A").await.unwrap().unwrap().title.as_deref(),
            Some("Stored earlier")
        );
    }

    #[tokio::test]
    async fn test_nothing_missing_means_no_requests() {
        let (fetcher, repo, client) = setup(MockScholarClient::new().with_paper("A"), fast_config()).await;
        repo.upsert_papers(vec![PaperRecord::with_id("A").into_paper().unwrap()])
            .await
            .unwrap();

        let report = fetcher.fill_missing(&ids(&["A"])).await.unwrap();
        assert_eq!(report, FetchReport::default());

        let report = fetcher.fill_missing(&BTreeSet::new()).await.unwrap();
        assert_eq!(report.fetched, 0);
        assert_eq!(client.batch_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_dropped_silently() {
        let (fetcher, repo, _) = setup(MockScholarClient::new().with_paper("A"), fast_config()).await;

        let report = fetcher.fill_missing(&ids(&["A", "ghost"])).await.unwrap();

        assert_eq!(report.fetched, 1);
        assert!(report.failed.is_empty());
        assert_eq!(repo.stats().await.unwrap().papers, 1);
    }

    #[tokio::test]
    async fn test_batches_are_sorted_and_bounded() {
        let mut client = MockScholarClient::new();
        for id in ["E", "D", "C", "B", "A"] {
            client = client.with_paper(id);
        }
        let config = FetcherConfig {
            batch_size: 2,
            ..fast_config()
        };
        let (fetcher, _, client) = setup(client, config).await;

        let report = fetcher.fill_missing(&ids(&["E", "D", "C", "B", "A"])).await.unwrap();

        assert_eq!(report.fetched, 5);
        let requests = client.batch_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], vec!["A".to_string(), "B".to_string()]);
        assert_eq!(requests[2], vec!["E".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let client = MockScholarClient::new()
            .with_paper("A")
            .with_paper("B")
            .with_paper("C")
            .with_batch_failure("A", MockFailure::RateLimited);
        let config = FetcherConfig {
            batch_size: 2,
            max_attempts: 2,
            ..fast_config()
        };
        let (fetcher, _, client) = setup(client, config).await;

        let report = fetcher.fill_missing(&ids(&["A", "B", "C"])).await.unwrap();

        assert_eq!(report.failed, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(report.fetched, 1);
        assert_eq!(client.batch_calls(), 3);
    }

    #[tokio::test]
    async fn test_cooldown_and_linear_retry_timing() {
        let client = MockScholarClient::new()
            .with_paper("A")
            .with_batch_failure("B", MockFailure::Unavailable);
        let config = FetcherConfig {
            batch_size: 1,
            batch_cooldown_ms: 50,
            retry_base_ms: 20,
            max_attempts: 3,
        };
        let (fetcher, _, _) = setup(client, config).await;

        let started = Instant::now();
        let report = fetcher.fill_missing(&ids(&["A", "B"])).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.fetched, 1);
        assert_eq!(report.failed, vec!["B".to_string()]);
        // One cooldown before B, then 20 + 40 + 60 ms of retry waits
        let expected = Duration::from_millis(170);
        assert!(elapsed >= expected, "elapsed {:?}", elapsed);
        assert!(elapsed < expected * 2, "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_no_cooldown_before_first_batch() {
        let config = FetcherConfig {
            batch_cooldown_ms: 500,
            ..fast_config()
        };
        let (fetcher, _, _) = setup(MockScholarClient::new().with_paper("A"), config).await;

        let started = Instant::now();
        let report = fetcher.fill_missing(&ids(&["A"])).await.unwrap();

        assert_eq!(report.fetched, 1);
        assert!(started.elapsed() < Duration::from_millis(250));
    }
}
