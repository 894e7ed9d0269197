//! Traversal direction over the citing→cited relation

use crate::db::models::{Citation, CitationColumn};
use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which relation a crawl follows from each node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Papers citing the current node (up / forward in time)
    #[default]
    Citations,
    /// Papers the current node cites (down / backward in time)
    References,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Citations => "citations",
            Direction::References => "references",
        }
    }

    /// Edge endpoint that is "this node" for the direction.
    ///
    /// Presence of any edge keyed on this column marks the node as already
    /// crawled in this direction.
    pub fn cache_column(&self) -> CitationColumn {
        match self {
            Direction::Citations => CitationColumn::CitedId,
            Direction::References => CitationColumn::CitingId,
        }
    }

    /// Edge endpoint that is the neighbor for the direction
    pub fn neighbor_column(&self) -> CitationColumn {
        match self {
            Direction::Citations => CitationColumn::CitingId,
            Direction::References => CitationColumn::CitedId,
        }
    }

    /// Neighbor endpoint of a stored edge
    pub fn neighbor_of<'a>(&self, edge: &'a Citation) -> &'a str {
        match self {
            Direction::Citations => &edge.citing_id,
            Direction::References => &edge.cited_id,
        }
    }

    /// Orient a (node, neighbor) pair as (citing, cited)
    pub fn orient(&self, node: String, neighbor: String) -> (String, String) {
        match self {
            Direction::Citations => (neighbor, node),
            Direction::References => (node, neighbor),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citations" => Ok(Direction::Citations),
            "references" => Ok(Direction::References),
            _ => Err(AppError::InvalidDirection {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direction() {
        assert_eq!("citations".parse::<Direction>().unwrap(), Direction::Citations);
        assert_eq!(" References ".parse::<Direction>().unwrap(), Direction::References);

        let err = "sideways".parse::<Direction>().unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_columns_are_swapped() {
        use sea_orm::IdenStatic;

        assert_eq!(Direction::Citations.cache_column().as_str(), "cited_id");
        assert_eq!(Direction::Citations.neighbor_column().as_str(), "citing_id");
        assert_eq!(Direction::References.cache_column().as_str(), "citing_id");
        assert_eq!(Direction::References.neighbor_column().as_str(), "cited_id");
    }

    #[test]
    fn test_orient() {
        let (citing, cited) = Direction::Citations.orient("P".into(), "N".into());
        assert_eq!((citing.as_str(), cited.as_str()), ("N", "P"));

        let (citing, cited) = Direction::References.orient("P".into(), "N".into());
        assert_eq!((citing.as_str(), cited.as_str()), ("P", "N"));

        let edge = Citation::new("N", "P", false, vec![]);
        assert_eq!(Direction::Citations.neighbor_of(&edge), "N");
        assert_eq!(Direction::References.neighbor_of(&edge), "P");
    }
}
