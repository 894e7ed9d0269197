//! Root resolution
//!
//! Maps the identifiers a user types (DOIs, arXiv ids, links, native ids)
//! to canonical paper ids and records each one as an exploration root.

use crate::crawler::CrawlParams;
use chrono::Utc;
use citetree_common::db::models::ExplorationRoot;
use citetree_common::errors::{AppError, Result};
use citetree_common::{Repository, ScholarClient};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

fn native_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{40}$").unwrap())
}

fn prefixed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)(doi|arxiv|pmid|pmcid|acl|mag|corpusid|url)\s*:\s*(\S.*)$").unwrap()
    })
}

fn bare_doi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap())
}

fn doi_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?i)https?://(dx\.)?doi\.org/(10\.\d{4,9}/\S+)$").unwrap())
}

/// A paper identifier in one of the forms the upstream lookup accepts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternalId {
    /// 40-hex upstream paper id, or anything unrecognised passed through
    Native(String),
    Doi(String),
    ArXiv(String),
    Pmid(String),
    Pmcid(String),
    Acl(String),
    Mag(String),
    CorpusId(String),
    Url(String),
}

impl ExternalId {
    /// Parse user input; blank input is an input error
    pub fn parse(raw: &str) -> Result<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(AppError::InvalidInput {
                message: "empty paper id".to_string(),
            });
        }

        if native_id_pattern().is_match(input) {
            return Ok(ExternalId::Native(input.to_ascii_lowercase()));
        }

        if let Some(caps) = doi_link_pattern().captures(input) {
            return Ok(ExternalId::Doi(caps[2].to_string()));
        }

        if let Some(caps) = prefixed_pattern().captures(input) {
            let value = caps[2].trim().to_string();
            let id = match caps[1].to_ascii_lowercase().as_str() {
                "doi" => ExternalId::Doi(value),
                "arxiv" => ExternalId::ArXiv(value),
                "pmid" => ExternalId::Pmid(value),
                "pmcid" => ExternalId::Pmcid(value),
                "acl" => ExternalId::Acl(value),
                "mag" => ExternalId::Mag(value),
                "corpusid" => ExternalId::CorpusId(value),
                _ => ExternalId::Url(value),
            };
            return Ok(id);
        }

        if bare_doi_pattern().is_match(input) {
            return Ok(ExternalId::Doi(input.to_string()));
        }

        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(ExternalId::Url(input.to_string()));
        }

        Ok(ExternalId::Native(input.to_string()))
    }

    /// Form passed to the upstream lookup
    pub fn to_query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalId::Native(id) => f.write_str(id),
            ExternalId::Doi(id) => write!(f, "DOI:{}", id),
            ExternalId::ArXiv(id) => write!(f, "ARXIV:{}", id),
            ExternalId::Pmid(id) => write!(f, "PMID:{}", id),
            ExternalId::Pmcid(id) => write!(f, "PMCID:{}", id),
            ExternalId::Acl(id) => write!(f, "ACL:{}", id),
            ExternalId::Mag(id) => write!(f, "MAG:{}", id),
            ExternalId::CorpusId(id) => write!(f, "CorpusId:{}", id),
            ExternalId::Url(url) => write!(f, "URL:{}", url),
        }
    }
}

/// A user-supplied id mapped to its canonical paper id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoot {
    pub paper_id: String,
    /// The id exactly as the user typed it
    pub original_id: String,
    pub title: Option<String>,
}

/// Outcome of resolving a list of user ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub roots: Vec<ResolvedRoot>,
    /// Inputs that upstream does not know, as typed
    pub unresolved: Vec<String>,
}

impl Resolution {
    pub fn paper_ids(&self) -> Vec<String> {
        self.roots.iter().map(|r| r.paper_id.clone()).collect()
    }
}

/// Resolves user ids and records exploration roots
pub struct RootResolver {
    repository: Repository,
    client: Arc<dyn ScholarClient>,
}

impl RootResolver {
    pub fn new(repository: Repository, client: Arc<dyn ScholarClient>) -> Self {
        Self { repository, client }
    }

    /// Resolve each id; unknown ids are reported, upstream failures abort
    #[instrument(skip(self, external_ids), fields(inputs = external_ids.len()))]
    pub async fn resolve(&self, external_ids: &[String]) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();

        for raw in external_ids {
            let id = match ExternalId::parse(raw) {
                Ok(id) => id,
                Err(e) => {
                    warn!(input = %raw, error = %e, "Skipping unparseable paper id");
                    resolution.unresolved.push(raw.clone());
                    continue;
                }
            };

            let query = id.to_query();
            debug!(input = %raw, query = %query, "Resolving paper id");

            let record = match self.client.get_paper(&query).await {
                Ok(record) => record,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };

            let Some((paper_id, title)) =
                record.and_then(|r| Some((r.paper_id.filter(|id| !id.is_empty())?, r.title)))
            else {
                warn!(input = %raw, "Paper not found upstream");
                resolution.unresolved.push(raw.clone());
                continue;
            };

            if !seen.insert(paper_id.clone()) {
                debug!(input = %raw, paper_id = %paper_id, "Duplicate root collapsed");
                continue;
            }

            resolution.roots.push(ResolvedRoot {
                paper_id,
                original_id: raw.trim().to_string(),
                title,
            });
        }

        if resolution.roots.is_empty() {
            return Err(AppError::InvalidInput {
                message: "No valid paper IDs provided".to_string(),
            });
        }

        info!(
            resolved = resolution.roots.len(),
            unresolved = resolution.unresolved.len(),
            "Roots resolved"
        );
        Ok(resolution)
    }

    /// Upsert one exploration root per resolved id with this invocation's parameters
    pub async fn record_roots(&self, roots: &[ResolvedRoot], params: &CrawlParams) -> Result<()> {
        let added_at = Utc::now();
        for root in roots {
            self.repository
                .upsert_root(ExplorationRoot {
                    paper_id: root.paper_id.clone(),
                    original_id: root.original_id.clone(),
                    depth: params.depth as i32,
                    direction: params.direction.to_string(),
                    fetch_limit: params.limit as i32,
                    influential_only: params.influential_only,
                    added_at,
                })
                .await?;
        }
        debug!(count = roots.len(), "Roots recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citetree_common::scholar::{MockFailure, MockScholarClient};
    use citetree_common::{DbPool, Direction};

    const NATIVE: &str = "204e3073870fae3d05bcbc2f6a8e263d9b72e776";

    async fn resolver(client: MockScholarClient) -> (RootResolver, Repository) {
        let repo = Repository::new(DbPool::in_memory().await.unwrap());
        (RootResolver::new(repo.clone(), Arc::new(client)), repo)
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_external_ids() {
        assert_eq!(
            ExternalId::parse("arxiv:1706.03762").unwrap().to_query(),
            "ARXIV:1706.03762"
        );
        assert_eq!(
            ExternalId::parse("doi:10.1038/nature14539").unwrap(),
            ExternalId::Doi("10.1038/nature14539".into())
        );
        assert_eq!(
            ExternalId::parse("10.1038/nature14539").unwrap().to_query(),
            "DOI:10.1038/nature14539"
        );
        assert_eq!(
            ExternalId::parse("https://doi.org/10.1038/nature14539").unwrap().to_query(),
            "DOI:10.1038/nature14539"
        );
        assert_eq!(
            ExternalId::parse("https://arxiv.org/abs/1706.03762").unwrap().to_query(),
            "URL:https://arxiv.org/abs/1706.03762"
        );
        assert_eq!(
            ExternalId::parse("corpusid:215416146").unwrap().to_query(),
            "CorpusId:215416146"
        );
        assert_eq!(ExternalId::parse("PMID:19872477").unwrap().to_query(), "PMID:19872477");
        assert_eq!(
            ExternalId::parse(&NATIVE.to_uppercase()).unwrap(),
            ExternalId::Native(NATIVE.to_string())
        );
        assert_eq!(
            ExternalId::parse("  something-else ").unwrap(),
            ExternalId::Native("something-else".into())
        );
        assert!(ExternalId::parse("   ").unwrap_err().is_input_error());
    }

    #[tokio::test]
    async fn test_resolve_skips_unknown_ids() {
        let client = MockScholarClient::new()
            .with_paper(NATIVE)
            .with_alias("ARXIV:1706.03762", NATIVE)
            .with_lookup_failure("DOI:10.1/gone", MockFailure::NotFound);
        let (resolver, _) = resolver(client).await;

        let resolution = resolver
            .resolve(&ids(&["arXiv:1706.03762", "missing", "DOI:10.1/gone", ""]))
            .await
            .unwrap();

        assert_eq!(resolution.paper_ids(), vec![NATIVE.to_string()]);
        assert_eq!(resolution.roots[0].original_id, "arXiv:1706.03762");
        assert_eq!(resolution.unresolved, ids(&["missing", "DOI:10.1/gone", ""]));
    }

    #[tokio::test]
    async fn test_duplicate_roots_collapse() {
        let client = MockScholarClient::new()
            .with_paper(NATIVE)
            .with_alias("ARXIV:1706.03762", NATIVE);
        let (resolver, _) = resolver(client).await;

        let resolution = resolver
            .resolve(&ids(&["arXiv:1706.03762", NATIVE]))
            .await
            .unwrap();

        assert_eq!(resolution.roots.len(), 1);
        assert_eq!(resolution.roots[0].original_id, "arXiv:1706.03762");
    }

    #[tokio::test]
    async fn test_empty_resolution_is_input_error() {
        let (resolver, _) = resolver(MockScholarClient::new()).await;

        let err = resolver.resolve(&ids(&["nope"])).await.unwrap_err();
        assert!(err.is_input_error());

        let err = resolver.resolve(&[]).await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_resolution() {
        let client = MockScholarClient::new()
            .with_paper("A")
            .with_lookup_failure("B", MockFailure::RateLimited);
        let (resolver, _) = resolver(client).await;

        let err = resolver.resolve(&ids(&["A", "B"])).await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_record_roots_last_write_wins() {
        let client = MockScholarClient::new().with_paper("A");
        let (resolver, repo) = resolver(client).await;
        let resolution = resolver.resolve(&ids(&["A"])).await.unwrap();

        let mut params = CrawlParams {
            depth: 1,
            direction: Direction::Citations,
            limit: 100,
            influential_only: false,
        };
        resolver.record_roots(&resolution.roots, &params).await.unwrap();

        params.depth = 3;
        params.direction = Direction::References;
        params.influential_only = true;
        resolver.record_roots(&resolution.roots, &params).await.unwrap();

        let roots = repo.list_roots().await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].root.depth, 3);
        assert_eq!(roots[0].root.direction, "references");
        assert_eq!(roots[0].root.fetch_limit, 100);
        assert!(roots[0].root.influential_only);
    }
}
