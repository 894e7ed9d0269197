//! Graph crawler
//!
//! Breadth-first traversal over the citation relation, bounded by depth.
//!
//! - The edge table doubles as traversal memory: a node with any edge keyed
//!   on its cache column was crawled before and is expanded from the store.
//! - Storage and traversal are filtered independently. Every influential
//!   neighbor is traversed; non-influential edges are stored unless
//!   `influential_only` is set.
//! - A paper upstream no longer knows ends its own branch only.

use citetree_common::config::{CrawlerConfig, MAX_RELATIONS_PER_PAGE};
use citetree_common::db::models::Citation;
use citetree_common::errors::{AppError, Result};
use citetree_common::metrics::{record_edges_written, record_relation_cache, CrawlMetrics};
use citetree_common::{Direction, Repository, ScholarClient};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Parameters of one crawl invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CrawlParams {
    /// Maximum traversal depth; nodes at this depth are recorded, not expanded
    pub depth: u32,

    pub direction: Direction,

    /// Relations fetched per node
    #[validate(range(min = 1, max = 1000))]
    pub limit: usize,

    /// Store only influential edges (traversal is influential-only regardless)
    pub influential_only: bool,
}

impl CrawlParams {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            depth: config.depth,
            direction: config.direction,
            limit: config.limit.min(MAX_RELATIONS_PER_PAGE),
            influential_only: config.influential_only,
        }
    }
}

/// Result of one crawl
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    /// Every node seen, cached or fetched, including the unexpanded frontier
    pub discovered: BTreeSet<String>,
    /// Edge rows written this invocation
    pub edges_written: u64,
    /// Nodes expanded over the network
    pub nodes_fetched: usize,
    /// Nodes expanded from stored edges
    pub cache_hits: usize,
}

type ShimPredicate = dyn Fn(&AppError) -> bool + Send + Sync;

/// Compatibility shim for upstream clients that report "no neighbors" as a
/// connection failure. Matching errors on a relations fetch become an empty
/// result instead of aborting the crawl. Off unless configured.
#[derive(Clone)]
pub struct EmptyResultShim {
    predicate: Option<Arc<ShimPredicate>>,
}

impl EmptyResultShim {
    /// Every relations error propagates
    pub fn disabled() -> Self {
        Self { predicate: None }
    }

    /// Connection failures (before any response) read as empty results
    pub fn connection_failures() -> Self {
        Self::custom(|e| matches!(e, AppError::UpstreamConnection { .. }))
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&AppError) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        if config.empty_result_shim {
            Self::connection_failures()
        } else {
            Self::disabled()
        }
    }

    pub fn applies(&self, err: &AppError) -> bool {
        self.predicate.as_ref().is_some_and(|p| p(err))
    }
}

impl Default for EmptyResultShim {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for EmptyResultShim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmptyResultShim")
            .field("enabled", &self.predicate.is_some())
            .finish()
    }
}

/// Cache-aware breadth-first crawler
pub struct Crawler {
    repository: Repository,
    client: Arc<dyn ScholarClient>,
    shim: EmptyResultShim,
}

impl Crawler {
    pub fn new(repository: Repository, client: Arc<dyn ScholarClient>, shim: EmptyResultShim) -> Self {
        Self {
            repository,
            client,
            shim,
        }
    }

    /// Crawl from `seeds` up to `params.depth`.
    ///
    /// Fails on the first relations fetch error the shim does not absorb.
    /// Edges written before the failure stay in the store, so a re-run resumes.
    #[instrument(
        skip(self, seeds, params),
        fields(seeds = seeds.len(), depth = params.depth, direction = %params.direction)
    )]
    pub async fn crawl(&self, seeds: &[String], params: &CrawlParams) -> Result<CrawlOutcome> {
        params.validate()?;

        let direction = params.direction;
        let timer = CrawlMetrics::start(direction.as_str());

        let mut queue: VecDeque<(String, u32)> = seeds.iter().map(|s| (s.clone(), 0)).collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut outcome = CrawlOutcome::default();

        while let Some((node, depth)) = queue.pop_front() {
            if !visited.insert(node.clone()) {
                continue;
            }
            outcome.discovered.insert(node.clone());

            if depth >= params.depth {
                continue;
            }

            let cached = self.repository.edges_for(&node, direction).await?;
            if !cached.is_empty() {
                debug!(paper_id = %node, depth, edges = cached.len(), "Expanding from store");
                record_relation_cache(true, direction.as_str());
                outcome.cache_hits += 1;

                for edge in &cached {
                    let neighbor = direction.neighbor_of(edge).to_string();
                    if edge.is_influential {
                        queue.push_back((neighbor.clone(), depth + 1));
                    }
                    outcome.discovered.insert(neighbor);
                }
                continue;
            }

            record_relation_cache(false, direction.as_str());
            let relations = match self.client.get_relations(&node, direction, params.limit).await {
                Ok(relations) => relations,
                Err(e) if self.shim.applies(&e) => {
                    warn!(paper_id = %node, error = %e, "Treating failed relations fetch as empty");
                    Vec::new()
                }
                Err(e) if e.is_not_found() => {
                    warn!(paper_id = %node, error = %e, "Paper not found upstream, not expanding");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            outcome.nodes_fetched += 1;

            let fetched = relations.len();
            let mut edges = Vec::with_capacity(fetched);
            let mut listed = HashSet::with_capacity(fetched);
            for relation in relations {
                let Some(neighbor) = relation.paper_id.filter(|id| !id.is_empty()) else {
                    continue;
                };
                if !listed.insert(neighbor.clone()) {
                    continue;
                }

                if relation.is_influential {
                    queue.push_back((neighbor.clone(), depth + 1));
                }
                if params.influential_only && !relation.is_influential {
                    continue;
                }

                let (citing, cited) = direction.orient(node.clone(), neighbor.clone());
                edges.push(Citation::new(citing, cited, relation.is_influential, relation.intents));
                outcome.discovered.insert(neighbor);
            }

            debug!(
                paper_id = %node,
                depth,
                fetched,
                stored = edges.len(),
                "Expanded from upstream"
            );

            if !edges.is_empty() {
                let written = self.repository.upsert_citations(edges).await?;
                record_edges_written(written, direction.as_str());
                outcome.edges_written += written;
            }
        }

        timer.finish();
        info!(
            discovered = outcome.discovered.len(),
            edges_written = outcome.edges_written,
            nodes_fetched = outcome.nodes_fetched,
            cache_hits = outcome.cache_hits,
            "Crawl complete"
        );
        Ok(outcome)
    }
}
