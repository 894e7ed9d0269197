//! Exploration root entity
//!
//! Records user intent and provenance for a crawl, not traversal state.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exploration_roots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub paper_id: String,

    /// The ID used to add the root (e.g., PMID:123)
    #[sea_orm(column_type = "Text")]
    pub original_id: String,

    pub depth: i32,

    /// "citations" or "references"
    #[sea_orm(column_type = "Text")]
    pub direction: String,

    pub fetch_limit: i32,

    pub influential_only: bool,

    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
