//! Scholar API abstraction
//!
//! The crawler and fetcher only see the [`ScholarClient`] trait:
//! - node lookup by id (any supported external id form)
//! - citations/references listing, paginated at the upstream page maximum
//! - bulk node lookup, bounded by the upstream batch maximum
//!
//! Implementations classify failures into the [`AppError`] taxonomy
//! (not-found, rate-limited, transient, generic API).
//!
//! [`AppError`]: crate::errors::AppError

mod http;
mod mock;

pub use http::SemanticScholarClient;
pub use mock::{MockFailure, MockScholarClient};

use crate::db::models::Paper;
use crate::errors::Result;
use crate::graph::Direction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fields requested for papers stored in the graph
pub const PAPER_FIELDS: &[&str] = &[
    "paperId",
    "externalIds",
    "title",
    "abstract",
    "tldr",
    "year",
    "authors",
    "citationCount",
    "referenceCount",
    "influentialCitationCount",
    "fieldsOfStudy",
];

/// Fields requested for citations/references (to get isInfluential and intents)
pub const RELATION_FIELDS: &[&str] = &["paperId", "isInfluential", "intents"];

/// Trait for the remote bibliographic source
#[async_trait]
pub trait ScholarClient: Send + Sync {
    /// Look up a paper by any supported id; `None` when upstream has no such paper
    async fn get_paper(&self, paper_id: &str) -> Result<Option<PaperRecord>>;

    /// Up to `limit` relations of `paper_id` in `direction`
    async fn get_relations(
        &self,
        paper_id: &str,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<RelationRecord>>;

    /// Bulk lookup; one entry per requested id, in order, `None` for unknown ids
    async fn get_papers(&self, paper_ids: &[String]) -> Result<Vec<Option<PaperRecord>>>;
}

/// Paper as returned by the upstream API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub tldr: Option<Tldr>,
    pub year: Option<i32>,
    pub authors: Option<serde_json::Value>,
    pub citation_count: Option<i32>,
    pub reference_count: Option<i32>,
    pub influential_citation_count: Option<i32>,
    pub fields_of_study: Option<serde_json::Value>,
    pub external_ids: Option<serde_json::Value>,
}

/// Machine-generated summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tldr {
    pub model: Option<String>,
    pub text: Option<String>,
}

impl PaperRecord {
    /// Minimal record, mostly for lookups and tests
    pub fn with_id(paper_id: impl Into<String>) -> Self {
        Self {
            paper_id: Some(paper_id.into()),
            ..Self::default()
        }
    }

    /// Store row for this record; `None` when upstream sent no id
    pub fn into_paper(self) -> Option<Paper> {
        Some(Paper {
            paper_id: self.paper_id?,
            title: self.title,
            abstract_text: self.abstract_text,
            tldr: self.tldr.and_then(|t| t.text),
            year: self.year,
            authors: self.authors,
            citation_count: self.citation_count,
            reference_count: self.reference_count,
            influential_citation_count: self.influential_citation_count,
            fields_of_study: self.fields_of_study,
            external_ids: self.external_ids,
        })
    }
}

/// One citation or reference of a node, seen from that node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// The neighbor: citing paper for citations, cited paper for references.
    /// Upstream omits it for papers it cannot resolve.
    pub paper_id: Option<String>,
    pub is_influential: bool,
    pub intents: Vec<String>,
}

impl RelationRecord {
    pub fn new(paper_id: impl Into<String>, is_influential: bool) -> Self {
        Self {
            paper_id: Some(paper_id.into()),
            is_influential,
            intents: Vec::new(),
        }
    }
}
