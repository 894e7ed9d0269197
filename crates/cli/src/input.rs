//! Paper ids from stdin
//!
//! Accepts plain lines, a JSON array (of strings or objects), or JSONL, so
//! output of other tools can be piped straight in. Objects contribute their
//! `paperId` field, or `paper.paperId` for citation/reference listings.

use citetree_common::errors::Result;
use serde_json::Value;
use std::io::{IsTerminal, Read};

const ID_FIELD: &str = "paperId";

/// Read ids from stdin; an interactive terminal yields nothing
pub fn read_stdin_ids() -> Result<Vec<String>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }

    let mut content = String::new();
    stdin.read_to_string(&mut content)?;
    Ok(parse_ids(&content))
}

pub fn parse_ids(content: &str) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        Vec::new()
    } else if content.starts_with('[') {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Array(items)) => items.iter().filter_map(id_from_value).collect(),
            _ => Vec::new(),
        }
    } else if content.starts_with('{') {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str::<Value>(line) {
                Ok(value) => id_from_value(&value),
                // Not JSON, take the line as an id
                Err(_) => Some(line.to_string()),
            })
            .collect()
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) => match map.get(ID_FIELD) {
            Some(field) => scalar_to_string(field),
            None => map.get("paper")?.get(ID_FIELD).and_then(scalar_to_string),
        },
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines() {
        let ids = parse_ids("arXiv:1706.03762\n\n  DOI:10.1038/nature14539  \n");
        assert_eq!(ids, vec!["arXiv:1706.03762", "DOI:10.1038/nature14539"]);
    }

    #[test]
    fn test_json_array() {
        let ids = parse_ids(
            r#"[{"paperId": "abc", "title": "x"}, "PMID:1", {"paper": {"paperId": "def"}}, {"title": "none"}, 42]"#,
        );
        assert_eq!(ids, vec!["abc", "PMID:1", "def"]);
    }

    #[test]
    fn test_jsonl_with_plain_fallback() {
        let ids = parse_ids("{\"paperId\": \"abc\"}\n{\"paperId\": 123}\nnot-json\n");
        assert_eq!(ids, vec!["abc", "123", "not-json"]);
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(parse_ids("   \n").is_empty());
        assert!(parse_ids("[not json").is_empty());
    }
}
