//! Graph store for citetree
//!
//! Provides:
//! - SeaORM entity models (papers, citation edges, exploration roots)
//! - Repository pattern for data access
//! - SQLite connection management and schema bootstrap
//! - Full-text projection over paper text, maintained by triggers

pub mod models;
mod repository;

pub use repository::{GraphStats, PaperHit, Repository, RootSummary};

use crate::config::DatabaseConfig;
use crate::db::models::{CitationEntity, ExplorationRootEntity, PaperEntity};
use crate::errors::{AppError, Result};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema, Statement,
};
use std::time::Duration;
use tracing::{debug, info};

/// Full-text projection over papers, kept in sync by triggers so that every
/// paper write refreshes it in the same transaction.
const FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS papers_fts USING fts5(
    title, abstract, tldr, authors,
    content='papers', content_rowid='rowid'
)
"#;

const FTS_TRIGGERS: &[&str] = &[
    r#"
    CREATE TRIGGER IF NOT EXISTS papers_fts_ai AFTER INSERT ON papers BEGIN
        INSERT INTO papers_fts(rowid, title, abstract, tldr, authors)
        VALUES (new.rowid, new.title, new.abstract, new.tldr, new.authors);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS papers_fts_ad AFTER DELETE ON papers BEGIN
        INSERT INTO papers_fts(papers_fts, rowid, title, abstract, tldr, authors)
        VALUES ('delete', old.rowid, old.title, old.abstract, old.tldr, old.authors);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS papers_fts_au AFTER UPDATE ON papers BEGIN
        INSERT INTO papers_fts(papers_fts, rowid, title, abstract, tldr, authors)
        VALUES ('delete', old.rowid, old.title, old.abstract, old.tldr, old.authors);
        INSERT INTO papers_fts(rowid, title, abstract, tldr, authors)
        VALUES (new.rowid, new.title, new.abstract, new.tldr, new.authors);
    END
    "#,
];

/// Database connection wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Open the store from configuration and make sure the schema exists
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(url = %config.url, "Opening graph store...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections.max(1))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to open {}: {}", config.url, e),
            })?;

        let pool = Self { conn };
        pool.ensure_schema().await?;

        debug!("Graph store ready");
        Ok(pool)
    }

    /// Private in-memory store, mostly for tests
    pub async fn in_memory() -> Result<Self> {
        Self::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..DatabaseConfig::default()
        })
        .await
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Create tables, indexes and the text-search projection if missing
    async fn ensure_schema(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        let tables = [
            schema.create_table_from_entity(PaperEntity),
            schema.create_table_from_entity(CitationEntity),
            schema.create_table_from_entity(ExplorationRootEntity),
        ];
        for mut table in tables {
            table.if_not_exists();
            self.conn.execute(backend.build(&table)).await?;
        }

        // Reverse lookup by cited paper
        for mut index in schema.create_index_from_entity(CitationEntity) {
            index.if_not_exists();
            self.conn.execute(backend.build(&index)).await?;
        }

        let fts_exists = self
            .conn
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'papers_fts'",
            ))
            .await?
            .is_some();

        self.conn.execute_unprepared(FTS_TABLE).await?;
        for trigger in FTS_TRIGGERS {
            self.conn.execute_unprepared(trigger).await?;
        }

        if !fts_exists {
            // Index papers written before the projection existed
            self.conn
                .execute_unprepared("INSERT INTO papers_fts(papers_fts) VALUES ('rebuild')")
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = DbPool::in_memory().await.unwrap();
        pool.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_store_persists_across_reopen() {
        use crate::db::models::Citation;

        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: crate::config::sqlite_url(&dir.path().join("papers.db")),
            ..DatabaseConfig::default()
        };

        {
            let repo = Repository::new(DbPool::new(&config).await.unwrap());
            repo.upsert_citations(vec![Citation::new("A", "B", true, vec![])])
                .await
                .unwrap();
        }

        let repo = Repository::new(DbPool::new(&config).await.unwrap());
        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.influential_edges, 1);
    }
}
