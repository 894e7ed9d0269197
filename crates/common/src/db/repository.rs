//! Repository pattern for graph store operations
//!
//! All writes are upserts on natural keys, so repeated or interrupted runs
//! can be re-issued safely.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use crate::graph::Direction;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Rows per INSERT statement, well under SQLite's bound-variable limit
const WRITE_CHUNK: usize = 200;

/// Ids per IN (...) lookup
const LOOKUP_CHUNK: usize = 500;

/// Placeholder for roots whose paper has not been fetched yet
pub const UNFETCHED_TITLE: &str = "(title not fetched)";

/// Store-wide counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub roots: u64,
    pub papers: u64,
    pub edges: u64,
    pub influential_edges: u64,
}

/// Exploration root with its resolved title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootSummary {
    #[serde(flatten)]
    pub root: ExplorationRoot,
    pub title: String,
}

/// Result from full-text search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperHit {
    pub paper_id: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub score: f64,
}

/// Repository for graph store operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    /// Insert or overwrite papers by id, returning rows written
    pub async fn upsert_papers(&self, papers: Vec<Paper>) -> Result<u64> {
        let mut written = 0u64;

        for chunk in papers.chunks(WRITE_CHUNK) {
            let models = chunk.iter().cloned().map(paper_active_model);

            PaperEntity::insert_many(models)
                .on_conflict(
                    OnConflict::column(PaperColumn::PaperId)
                        .update_columns([
                            PaperColumn::Title,
                            PaperColumn::AbstractText,
                            PaperColumn::Tldr,
                            PaperColumn::Year,
                            PaperColumn::Authors,
                            PaperColumn::CitationCount,
                            PaperColumn::ReferenceCount,
                            PaperColumn::InfluentialCitationCount,
                            PaperColumn::FieldsOfStudy,
                            PaperColumn::ExternalIds,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(self.conn())
                .await?;

            written += chunk.len() as u64;
        }

        Ok(written)
    }

    /// Find paper by ID
    pub async fn find_paper(&self, paper_id: &str) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(paper_id.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Subset of `ids` already present in the store
    pub async fn existing_paper_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let found: Vec<String> = PaperEntity::find()
                .select_only()
                .column(PaperColumn::PaperId)
                .filter(PaperColumn::PaperId.is_in(chunk.iter().cloned()))
                .into_tuple()
                .all(self.conn())
                .await?;
            existing.extend(found);
        }

        Ok(existing)
    }

    /// Full-text search over title, abstract, tldr and author names
    pub async fn search_papers(&self, query: &str, limit: u64) -> Result<Vec<PaperHit>> {
        let Some(match_expr) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let stmt = Statement::from_sql_and_values(
            DbBackend::Sqlite,
            r#"
            SELECT p.paper_id, p.title, p.year, bm25(papers_fts) AS score
            FROM papers_fts
            JOIN papers p ON p.rowid = papers_fts.rowid
            WHERE papers_fts MATCH ?
            ORDER BY score
            LIMIT ?
            "#,
            vec![match_expr.into(), (limit as i64).into()],
        );

        let hits = self
            .conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| {
                Some(PaperHit {
                    paper_id: row.try_get::<String>("", "paper_id").ok()?,
                    title: row.try_get::<Option<String>>("", "title").ok()?,
                    year: row.try_get::<Option<i32>>("", "year").ok()?,
                    // bm25 is lower-is-better; flip so callers see higher-is-better
                    score: -row.try_get::<f64>("", "score").ok()?,
                })
            })
            .collect();

        Ok(hits)
    }

    // ========================================================================
    // Citation Operations
    // ========================================================================

    /// Insert or overwrite edges keyed by (citing, cited), returning rows written
    pub async fn upsert_citations(&self, edges: Vec<Citation>) -> Result<u64> {
        let mut written = 0u64;

        for chunk in edges.chunks(WRITE_CHUNK) {
            let models = chunk.iter().cloned().map(citation_active_model);

            CitationEntity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([CitationColumn::CitingId, CitationColumn::CitedId])
                        .update_columns([CitationColumn::IsInfluential, CitationColumn::Intents])
                        .to_owned(),
                )
                .exec_without_returning(self.conn())
                .await?;

            written += chunk.len() as u64;
        }

        Ok(written)
    }

    /// Stored edges keyed on the node's cache column for `direction`.
    ///
    /// A non-empty result means the node was already crawled in that direction.
    pub async fn edges_for(&self, paper_id: &str, direction: Direction) -> Result<Vec<Citation>> {
        CitationEntity::find()
            .filter(direction.cache_column().eq(paper_id))
            .order_by_asc(direction.neighbor_column())
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Root Operations
    // ========================================================================

    /// Record a root; re-adding the same paper overwrites the earlier record
    pub async fn upsert_root(&self, root: ExplorationRoot) -> Result<()> {
        let model = ExplorationRootActiveModel {
            paper_id: Set(root.paper_id),
            original_id: Set(root.original_id),
            depth: Set(root.depth),
            direction: Set(root.direction),
            fetch_limit: Set(root.fetch_limit),
            influential_only: Set(root.influential_only),
            added_at: Set(root.added_at),
        };

        ExplorationRootEntity::insert(model)
            .on_conflict(
                OnConflict::column(ExplorationRootColumn::PaperId)
                    .update_columns([
                        ExplorationRootColumn::OriginalId,
                        ExplorationRootColumn::Depth,
                        ExplorationRootColumn::Direction,
                        ExplorationRootColumn::FetchLimit,
                        ExplorationRootColumn::InfluentialOnly,
                        ExplorationRootColumn::AddedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn())
            .await?;

        Ok(())
    }

    /// Roots in the order they were added, with best-effort titles
    pub async fn list_roots(&self) -> Result<Vec<RootSummary>> {
        let roots = ExplorationRootEntity::find()
            .order_by_asc(ExplorationRootColumn::AddedAt)
            .all(self.conn())
            .await?;

        let ids: Vec<String> = roots.iter().map(|r| r.paper_id.clone()).collect();
        let mut titles: HashMap<String, String> = HashMap::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let rows: Vec<(String, Option<String>)> = PaperEntity::find()
                .select_only()
                .column(PaperColumn::PaperId)
                .column(PaperColumn::Title)
                .filter(PaperColumn::PaperId.is_in(chunk.iter().cloned()))
                .into_tuple()
                .all(self.conn())
                .await?;
            titles.extend(rows.into_iter().filter_map(|(id, title)| Some((id, title?))));
        }

        Ok(roots
            .into_iter()
            .map(|root| {
                let title = titles
                    .remove(&root.paper_id)
                    .unwrap_or_else(|| UNFETCHED_TITLE.to_string());
                RootSummary { root, title }
            })
            .collect())
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Counts of roots, papers, edges and influential edges
    pub async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            roots: ExplorationRootEntity::find().count(self.conn()).await?,
            papers: PaperEntity::find().count(self.conn()).await?,
            edges: CitationEntity::find().count(self.conn()).await?,
            influential_edges: CitationEntity::find()
                .filter(CitationColumn::IsInfluential.eq(true))
                .count(self.conn())
                .await?,
        })
    }
}

fn paper_active_model(paper: Paper) -> PaperActiveModel {
    PaperActiveModel {
        paper_id: Set(paper.paper_id),
        title: Set(paper.title),
        abstract_text: Set(paper.abstract_text),
        tldr: Set(paper.tldr),
        year: Set(paper.year),
        authors: Set(paper.authors),
        citation_count: Set(paper.citation_count),
        reference_count: Set(paper.reference_count),
        influential_citation_count: Set(paper.influential_citation_count),
        fields_of_study: Set(paper.fields_of_study),
        external_ids: Set(paper.external_ids),
    }
}

fn citation_active_model(edge: Citation) -> CitationActiveModel {
    CitationActiveModel {
        citing_id: Set(edge.citing_id),
        cited_id: Set(edge.cited_id),
        is_influential: Set(edge.is_influential),
        intents: Set(edge.intents),
    }
}

/// Quote each term so user punctuation cannot break FTS5 query syntax.
/// Terms are implicitly AND-ed.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    (!terms.is_empty()).then(|| terms.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    async fn repo() -> Repository {
        Repository::new(DbPool::in_memory().await.unwrap())
    }

    fn paper(id: &str, title: &str) -> Paper {
        Paper {
            paper_id: id.to_string(),
            title: Some(title.to_string()),
            abstract_text: Some(format!("Abstract of {}", title)),
            tldr: None,
            year: Some(2017),
            authors: Some(json!([{"authorId": "1", "name": "Ashish Vaswani"}])),
            citation_count: Some(10),
            reference_count: Some(3),
            influential_citation_count: Some(1),
            fields_of_study: Some(json!(["Computer Science"])),
            external_ids: Some(json!({"ArXiv": "1706.03762"})),
        }
    }

    fn root(id: &str, original: &str, depth: i32) -> ExplorationRoot {
        ExplorationRoot {
            paper_id: id.to_string(),
            original_id: original.to_string(),
            depth,
            direction: Direction::Citations.to_string(),
            fetch_limit: 1000,
            influential_only: false,
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_edge_upsert_overwrites_instead_of_duplicating() {
        let repo = repo().await;

        repo.upsert_citations(vec![Citation::new("A", "B", false, vec![])])
            .await
            .unwrap();
        repo.upsert_citations(vec![Citation::new(
            "A",
            "B",
            true,
            vec!["methodology".to_string()],
        )])
        .await
        .unwrap();

        let edges = repo.edges_for("B", Direction::Citations).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_influential);
        assert_eq!(edges[0].intent_list(), vec!["methodology".to_string()]);

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.influential_edges, 1);
    }

    #[tokio::test]
    async fn test_edges_for_uses_cache_column() {
        let repo = repo().await;
        repo.upsert_citations(vec![
            Citation::new("A", "P", true, vec![]),
            Citation::new("B", "P", false, vec![]),
            Citation::new("P", "C", false, vec![]),
        ])
        .await
        .unwrap();

        let citing: Vec<String> = repo
            .edges_for("P", Direction::Citations)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.citing_id)
            .collect();
        assert_eq!(citing, vec!["A", "B"]);

        let cited: Vec<String> = repo
            .edges_for("P", Direction::References)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.cited_id)
            .collect();
        assert_eq!(cited, vec!["C"]);

        assert!(repo.edges_for("C", Direction::References).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_paper_ids() {
        let repo = repo().await;
        repo.upsert_papers(vec![paper("A", "Attention"), paper("B", "BERT")])
            .await
            .unwrap();

        let ids = vec!["A".to_string(), "C".to_string()];
        let existing = repo.existing_paper_ids(&ids).await.unwrap();
        assert_eq!(existing, HashSet::from(["A".to_string()]));

        assert!(repo.existing_paper_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paper_upsert_updates_fields() {
        let repo = repo().await;
        repo.upsert_papers(vec![paper("A", "Draft title")]).await.unwrap();
        repo.upsert_papers(vec![paper("A", "Final title")]).await.unwrap();

        let stored = repo.find_paper("A").await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Final title"));
        assert_eq!(repo.stats().await.unwrap().papers, 1);
    }

    #[tokio::test]
    async fn test_search_follows_paper_updates() {
        let repo = repo().await;
        repo.upsert_papers(vec![
            paper("A", "Attention is all you need"),
            paper("B", "Deep residual learning"),
        ])
        .await
        .unwrap();

        let hits = repo.search_papers("attention", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].paper_id, "A");

        // Author names are indexed too
        let hits = repo.search_papers("Vaswani", 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        repo.upsert_papers(vec![paper("A", "Transformers revisited")])
            .await
            .unwrap();
        assert!(repo.search_papers("attention", 10).await.unwrap().is_empty());
        assert_eq!(repo.search_papers("transformers", 10).await.unwrap().len(), 1);

        assert!(repo.search_papers("   ", 10).await.unwrap().is_empty());
        // Punctuation does not break the query
        assert!(repo.search_papers("arXiv:1706 \"x", 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_roots_last_write_wins_and_titles() {
        let repo = repo().await;
        repo.upsert_papers(vec![paper("A", "Attention")]).await.unwrap();

        repo.upsert_root(root("A", "arXiv:1706.03762", 2)).await.unwrap();
        repo.upsert_root(root("A", "DOI:10.5555/attention", 3)).await.unwrap();
        repo.upsert_root(root("Z", "PMID:1", 1)).await.unwrap();

        let roots = repo.list_roots().await.unwrap();
        assert_eq!(roots.len(), 2);

        let a = roots.iter().find(|r| r.root.paper_id == "A").unwrap();
        assert_eq!(a.root.original_id, "DOI:10.5555/attention");
        assert_eq!(a.root.depth, 3);
        assert_eq!(a.title, "Attention");

        let z = roots.iter().find(|r| r.root.paper_id == "Z").unwrap();
        assert_eq!(z.title, UNFETCHED_TITLE);

        assert_eq!(repo.stats().await.unwrap().roots, 2);
    }

    #[test]
    fn test_fts_match_expression() {
        assert_eq!(
            fts_match_expression("graph  neural"),
            Some("\"graph\" \"neural\"".to_string())
        );
        assert_eq!(fts_match_expression("\"\""), None);
        assert_eq!(fts_match_expression(""), None);
    }
}
