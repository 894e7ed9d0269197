//! In-memory scholar client for tests and offline runs

use super::{PaperRecord, RelationRecord, ScholarClient};
use crate::errors::{AppError, Result};
use crate::graph::Direction;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Failure injected into a mock call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Connection,
    Unavailable,
    RateLimited,
    Api,
    NotFound,
}

impl MockFailure {
    fn to_error(self, id: &str) -> AppError {
        match self {
            MockFailure::Connection => AppError::UpstreamConnection {
                message: format!("connection refused for {}", id),
            },
            MockFailure::Unavailable => AppError::UpstreamUnavailable {
                message: format!("gateway timeout for {}", id),
            },
            MockFailure::RateLimited => AppError::RateLimited {
                message: format!("too many requests for {}", id),
            },
            MockFailure::Api => AppError::Upstream {
                status: 500,
                message: format!("internal error for {}", id),
            },
            MockFailure::NotFound => AppError::PaperNotFound { id: id.to_string() },
        }
    }
}

/// Mock scholar client backed by an in-memory citation graph
#[derive(Default)]
pub struct MockScholarClient {
    papers: HashMap<String, PaperRecord>,
    aliases: HashMap<String, String>,
    citations: HashMap<String, Vec<RelationRecord>>,
    references: HashMap<String, Vec<RelationRecord>>,
    relation_failures: HashMap<String, MockFailure>,
    lookup_failures: HashMap<String, MockFailure>,
    batch_failures: HashMap<String, MockFailure>,
    relation_log: Mutex<Vec<(String, Direction)>>,
    batch_log: Mutex<Vec<Vec<String>>>,
    lookup_calls: AtomicUsize,
}

impl MockScholarClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known paper with a generated title
    pub fn with_paper(mut self, paper_id: &str) -> Self {
        let record = PaperRecord {
            title: Some(format!("Paper {}", paper_id)),
            ..PaperRecord::with_id(paper_id)
        };
        self.papers.insert(paper_id.to_string(), record);
        self
    }

    pub fn with_record(mut self, record: PaperRecord) -> Self {
        if let Some(id) = record.paper_id.clone() {
            self.papers.insert(id, record);
        }
        self
    }

    /// External id (DOI:..., ARXIV:...) that looks up `paper_id`
    pub fn with_alias(mut self, external_id: &str, paper_id: &str) -> Self {
        self.aliases
            .insert(external_id.to_string(), paper_id.to_string());
        self
    }

    /// `citing` cites `cited`; visible from both endpoints
    pub fn with_edge(self, citing: &str, cited: &str, is_influential: bool) -> Self {
        self.with_edge_intents(citing, cited, is_influential, &[])
    }

    pub fn with_edge_intents(
        mut self,
        citing: &str,
        cited: &str,
        is_influential: bool,
        intents: &[&str],
    ) -> Self {
        let intents: Vec<String> = intents.iter().map(|i| i.to_string()).collect();
        self.citations
            .entry(cited.to_string())
            .or_default()
            .push(RelationRecord {
                paper_id: Some(citing.to_string()),
                is_influential,
                intents: intents.clone(),
            });
        self.references
            .entry(citing.to_string())
            .or_default()
            .push(RelationRecord {
                paper_id: Some(cited.to_string()),
                is_influential,
                intents,
            });
        self
    }

    /// Relation whose neighbor upstream could not resolve
    pub fn with_unresolved_neighbor(mut self, paper_id: &str, direction: Direction) -> Self {
        self.relations_mut(direction)
            .entry(paper_id.to_string())
            .or_default()
            .push(RelationRecord::default());
        self
    }

    pub fn with_relation_failure(mut self, paper_id: &str, failure: MockFailure) -> Self {
        self.relation_failures.insert(paper_id.to_string(), failure);
        self
    }

    pub fn with_lookup_failure(mut self, paper_id: &str, failure: MockFailure) -> Self {
        self.lookup_failures.insert(paper_id.to_string(), failure);
        self
    }

    /// Every bulk request containing `paper_id` fails
    pub fn with_batch_failure(mut self, paper_id: &str, failure: MockFailure) -> Self {
        self.batch_failures.insert(paper_id.to_string(), failure);
        self
    }

    fn relations_mut(&mut self, direction: Direction) -> &mut HashMap<String, Vec<RelationRecord>> {
        match direction {
            Direction::Citations => &mut self.citations,
            Direction::References => &mut self.references,
        }
    }

    fn relations(&self, direction: Direction) -> &HashMap<String, Vec<RelationRecord>> {
        match direction {
            Direction::Citations => &self.citations,
            Direction::References => &self.references,
        }
    }

    /// Total relation fetches issued
    pub fn relation_calls(&self) -> usize {
        self.relation_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Relation fetches issued for one paper
    pub fn relation_calls_for(&self, paper_id: &str) -> usize {
        self.relation_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| id == paper_id)
            .count()
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_requests().len()
    }

    /// Ids of every bulk request issued, in order
    pub fn batch_requests(&self) -> Vec<Vec<String>> {
        self.batch_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ScholarClient for MockScholarClient {
    async fn get_paper(&self, paper_id: &str) -> Result<Option<PaperRecord>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = self.lookup_failures.get(paper_id) {
            return Err(failure.to_error(paper_id));
        }

        let id = self
            .aliases
            .get(paper_id)
            .map(String::as_str)
            .unwrap_or(paper_id);
        Ok(self.papers.get(id).cloned())
    }

    async fn get_relations(
        &self,
        paper_id: &str,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<RelationRecord>> {
        self.relation_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((paper_id.to_string(), direction));

        if let Some(failure) = self.relation_failures.get(paper_id) {
            return Err(failure.to_error(paper_id));
        }

        Ok(self
            .relations(direction)
            .get(paper_id)
            .map(|records| records.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_papers(&self, paper_ids: &[String]) -> Result<Vec<Option<PaperRecord>>> {
        self.batch_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(paper_ids.to_vec());

        if let Some((id, failure)) = paper_ids
            .iter()
            .find_map(|id| self.batch_failures.get(id).map(|f| (id, *f)))
        {
            return Err(failure.to_error(id));
        }

        Ok(paper_ids
            .iter()
            .map(|id| self.papers.get(id).cloned())
            .collect())
    }
}
