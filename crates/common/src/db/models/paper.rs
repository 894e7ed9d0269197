//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub paper_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    #[sea_orm(column_name = "abstract", column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    /// Short machine-generated summary
    #[sea_orm(column_type = "Text", nullable)]
    pub tldr: Option<String>,

    pub year: Option<i32>,

    /// Ordered author descriptors as returned upstream
    #[sea_orm(column_type = "Json", nullable)]
    pub authors: Option<Json>,

    pub citation_count: Option<i32>,

    pub reference_count: Option<i32>,

    pub influential_citation_count: Option<i32>,

    #[sea_orm(column_type = "Json", nullable)]
    pub fields_of_study: Option<Json>,

    /// DOI / ArXiv / PubMed / ... identifiers
    #[sea_orm(column_type = "Json", nullable)]
    pub external_ids: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
