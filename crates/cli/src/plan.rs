//! YAML crawl plans
//!
//! ```yaml
//! depth: 2
//! direction: citations
//! limit: 1000
//! influential_only: false
//! papers:
//!   - arXiv:1706.03762
//!   - id: DOI:10.1038/nature14539
//! ```

use citetree_common::errors::{AppError, Result};
use citetree_common::Direction;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct RawPlan {
    depth: Option<u32>,
    direction: Option<String>,
    limit: Option<usize>,
    influential_only: Option<bool>,
    #[serde(default)]
    papers: Vec<PaperEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaperEntry {
    Id(String),
    Object { id: String },
}

/// Crawl settings and roots read from a plan file; unset fields fall back
/// to flags and configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlPlan {
    pub depth: Option<u32>,
    pub direction: Option<Direction>,
    pub limit: Option<usize>,
    pub influential_only: Option<bool>,
    pub papers: Vec<String>,
}

impl CrawlPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::InvalidInput {
            message: format!("Cannot read plan {}: {}", path.display(), e),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: RawPlan = serde_yaml::from_str(content).map_err(|e| AppError::InvalidInput {
            message: format!("Invalid plan: {}", e),
        })?;

        let direction = raw
            .direction
            .as_deref()
            .map(str::parse::<Direction>)
            .transpose()?;

        Ok(Self {
            depth: raw.depth,
            direction,
            limit: raw.limit,
            influential_only: raw.influential_only,
            papers: raw
                .papers
                .into_iter()
                .map(|entry| match entry {
                    PaperEntry::Id(id) | PaperEntry::Object { id } => id,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_plan() {
        let plan = CrawlPlan::parse(
            "depth: 3\ndirection: references\nlimit: 200\ninfluential_only: true\npapers:\n  - arXiv:1706.03762\n  - id: DOI:10.1038/nature14539\n",
        )
        .unwrap();

        assert_eq!(plan.depth, Some(3));
        assert_eq!(plan.direction, Some(Direction::References));
        assert_eq!(plan.limit, Some(200));
        assert_eq!(plan.influential_only, Some(true));
        assert_eq!(plan.papers, vec!["arXiv:1706.03762", "DOI:10.1038/nature14539"]);
    }

    #[test]
    fn test_partial_and_empty_plans() {
        let plan = CrawlPlan::parse("papers:\n  - abc\n").unwrap();
        assert_eq!(plan.depth, None);
        assert_eq!(plan.papers, vec!["abc"]);

        assert_eq!(CrawlPlan::parse("").unwrap(), CrawlPlan::default());
    }

    #[test]
    fn test_invalid_plans_are_input_errors() {
        let err = CrawlPlan::parse("direction: sideways\n").unwrap_err();
        assert!(err.is_input_error());

        let err = CrawlPlan::parse("papers:\n  - title: no id here\n").unwrap_err();
        assert!(err.is_input_error());

        let err = CrawlPlan::parse("papers: abc\n").unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, "depth: 1\npapers: [PMID:19872477]\n").unwrap();

        let plan = CrawlPlan::load(&path).unwrap();
        assert_eq!(plan.depth, Some(1));
        assert_eq!(plan.papers, vec!["PMID:19872477"]);

        let err = CrawlPlan::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.is_input_error());
    }
}
