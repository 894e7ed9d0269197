//! Exploration pipeline
//!
//! Resolve roots, record them, crawl, then backfill metadata for everything
//! discovered.

use crate::crawler::{CrawlParams, Crawler, EmptyResultShim};
use crate::fetcher::MetadataFetcher;
use crate::resolver::{ResolvedRoot, RootResolver};
use citetree_common::errors::Result;
use citetree_common::{AppConfig, Repository, ScholarClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

/// What one `add` run did
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorationSummary {
    pub roots: Vec<ResolvedRoot>,
    pub unresolved: Vec<String>,
    pub discovered: usize,
    pub edges_written: u64,
    pub nodes_fetched: usize,
    pub cache_hits: usize,
    pub papers_fetched: u64,
    pub failed: Vec<String>,
}

/// Resolver, crawler and fetcher sharing one store and one client
pub struct ExplorationPipeline {
    resolver: RootResolver,
    crawler: Crawler,
    fetcher: MetadataFetcher,
}

impl ExplorationPipeline {
    pub fn new(repository: Repository, client: Arc<dyn ScholarClient>, config: &AppConfig) -> Self {
        Self {
            resolver: RootResolver::new(repository.clone(), client.clone()),
            crawler: Crawler::new(
                repository.clone(),
                client.clone(),
                EmptyResultShim::from_config(&config.crawler),
            ),
            fetcher: MetadataFetcher::new(repository, client, config.fetcher.clone()),
        }
    }

    #[instrument(skip_all, fields(inputs = external_ids.len()))]
    pub async fn run(&self, external_ids: &[String], params: &CrawlParams) -> Result<ExplorationSummary> {
        // Parameters are checked before the first lookup
        params.validate()?;

        let resolution = self.resolver.resolve(external_ids).await?;
        self.resolver.record_roots(&resolution.roots, params).await?;

        let outcome = self.crawler.crawl(&resolution.paper_ids(), params).await?;
        let report = self.fetcher.fill_missing(&outcome.discovered).await?;

        info!(
            roots = resolution.roots.len(),
            discovered = outcome.discovered.len(),
            papers_fetched = report.fetched,
            "Exploration complete"
        );

        Ok(ExplorationSummary {
            roots: resolution.roots,
            unresolved: resolution.unresolved,
            discovered: outcome.discovered.len(),
            edges_written: outcome.edges_written,
            nodes_fetched: outcome.nodes_fetched,
            cache_hits: outcome.cache_hits,
            papers_fetched: report.fetched,
            failed: report.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citetree_common::scholar::MockScholarClient;
    use citetree_common::{DbPool, Direction};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.fetcher.batch_cooldown_ms = 1;
        config.fetcher.retry_base_ms = 1;
        config
    }

    fn params() -> CrawlParams {
        CrawlParams {
            depth: 1,
            direction: Direction::Citations,
            limit: 100,
            influential_only: false,
        }
    }

    #[tokio::test]
    async fn test_run_resolves_crawls_and_backfills() {
        let client = MockScholarClient::new()
            .with_paper("P")
            .with_paper("A")
            .with_paper("B")
            .with_alias("ARXIV:1706.03762", "P")
            .with_edge("A", "P", true)
            .with_edge("B", "P", false);
        let repo = Repository::new(DbPool::in_memory().await.unwrap());
        let pipeline = ExplorationPipeline::new(repo.clone(), Arc::new(client), &config());

        let summary = pipeline
            .run(&["arXiv:1706.03762".to_string(), "nope".to_string()], &params())
            .await
            .unwrap();

        assert_eq!(summary.roots.len(), 1);
        assert_eq!(summary.unresolved, vec!["nope".to_string()]);
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.edges_written, 2);
        assert_eq!(summary.papers_fetched, 3);
        assert!(summary.failed.is_empty());

        let stats = repo.stats().await.unwrap();
        assert_eq!((stats.roots, stats.papers, stats.edges), (1, 3, 2));

        let roots = repo.list_roots().await.unwrap();
        assert_eq!(roots[0].title, "Paper P");
        assert_eq!(roots[0].root.original_id, "arXiv:1706.03762");
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_lookup() {
        let client = Arc::new(MockScholarClient::new().with_paper("P"));
        let repo = Repository::new(DbPool::in_memory().await.unwrap());
        let pipeline = ExplorationPipeline::new(repo, client.clone(), &config());

        let params = CrawlParams {
            limit: 0,
            ..params()
        };
        let err = pipeline.run(&["P".to_string()], &params).await.unwrap_err();

        assert!(err.is_input_error());
        assert_eq!(client.lookup_calls(), 0);
    }
}
