//! Citation edge entity
//!
//! One row per ordered (citing, cited) pair. Re-inserting the same pair
//! overwrites the flag and intents.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paper_references")]
pub struct Model {
    /// Paper that contains the citation
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub citing_id: String,

    /// Paper that is being cited
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text", indexed)]
    pub cited_id: String,

    pub is_influential: bool,

    /// Citation intents, e.g. ["background", "methodology"]
    #[sea_orm(column_type = "Json", nullable)]
    pub intents: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(
        citing_id: impl Into<String>,
        cited_id: impl Into<String>,
        is_influential: bool,
        intents: Vec<String>,
    ) -> Self {
        Self {
            citing_id: citing_id.into(),
            cited_id: cited_id.into(),
            is_influential,
            intents: (!intents.is_empty()).then(|| Json::from(intents)),
        }
    }

    /// Intents as strings; anything non-string is skipped
    pub fn intent_list(&self) -> Vec<String> {
        self.intents
            .as_ref()
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
