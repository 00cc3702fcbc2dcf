//! Research sources: validation of search-tool output and synthesis formatting.
//!
//! Search tools return a JSON array of `{source, content, type}` records. The
//! researcher parses every tool result through [`parse_research_results`] before
//! the findings are accumulated, and [`format_synthesis`] renders the accumulated
//! findings when the iteration limit forces a handoff.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

/// Kind of research source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Web,
    Document,
}

impl SourceType {
    pub const ALL: [SourceType; 2] = [SourceType::Web, SourceType::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Web => "web",
            SourceType::Document => "document",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of retrieved evidence with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// URI or other identifier of where the content came from.
    pub source: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
}

impl Source {
    pub fn web(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            kind: SourceType::Web,
        }
    }

    pub fn document(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            kind: SourceType::Document,
        }
    }
}

const REQUIRED_FIELDS: [&str; 3] = ["source", "content", "type"];

/// Parse and validate a JSON array of research sources.
///
/// Elements are checked in order; the first offending element determines the
/// error, which names its index.
pub fn parse_research_results(text: &str) -> Result<Vec<Source>, ValidationError> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| ValidationError::InvalidJson {
        message: e.to_string(),
    })?;

    let items = parsed
        .as_array()
        .ok_or_else(|| ValidationError::InvalidShape {
            message: format!("expected a list of sources, got {}", json_kind(&parsed)),
        })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_source(index, item))
        .collect()
}

fn validate_source(index: usize, item: &Value) -> Result<Source, ValidationError> {
    let object = item
        .as_object()
        .ok_or_else(|| ValidationError::InvalidShape {
            message: format!(
                "source at index {index} is not an object, got {}",
                json_kind(item)
            ),
        })?;

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields {
            index,
            fields: missing,
        });
    }

    let kind = object["type"]
        .as_str()
        .and_then(SourceType::parse)
        .ok_or_else(|| ValidationError::InvalidSourceType {
            index,
            value: object["type"].to_string(),
        })?;

    let source = string_field(index, object, "source")?;
    let content = string_field(index, object, "content")?;

    Ok(Source {
        source,
        content,
        kind,
    })
}

fn string_field(
    index: usize,
    object: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, ValidationError> {
    let value = object[field]
        .as_str()
        .ok_or_else(|| ValidationError::FieldType {
            index,
            field: field.to_string(),
        })?;
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            index,
            field: field.to_string(),
        });
    }
    Ok(value.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Render accumulated findings as the report handed back to the orchestrator.
///
/// Sources keep their input order.
pub fn format_synthesis(sources: &[Source]) -> String {
    let mut out = String::from("Research Complete - Findings Summary\n\n");
    let _ = writeln!(out, "Total Sources Gathered: {}\n", sources.len());
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(
            out,
            "[Source {}]\nType: {}\nSource: {}\nContent: {}\n",
            i + 1,
            source.kind,
            source.source,
            source.content
        );
    }
    out.push_str("---\nResearch Status: Complete\nIteration Limit: Reached");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_valid_results() {
        let json = r#"[
            {"source": "https://a.example", "content": "alpha", "type": "web"},
            {"source": "report.pdf", "content": "beta", "type": "document"}
        ]"#;
        let sources = parse_research_results(json).unwrap();
        assert_eq!(
            sources,
            vec![
                Source::web("https://a.example", "alpha"),
                Source::document("report.pdf", "beta"),
            ]
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_research_results("[]").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_research_results("{not valid}").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidJson { .. }));
    }

    #[test]
    fn test_top_level_not_a_list() {
        let err = parse_research_results(r#"{"source": "x"}"#).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidShape {
                message: "expected a list of sources, got object".into()
            }
        );
    }

    #[test]
    fn test_element_not_an_object() {
        let err = parse_research_results(r#"["just text"]"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidShape { .. }));
    }

    #[test]
    fn test_missing_fields_reports_index() {
        let json = r#"[
            {"source": "a", "content": "b", "type": "web"},
            {"source": "a"}
        ]"#;
        let err = parse_research_results(json).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields {
                index: 1,
                fields: vec!["content".into(), "type".into()],
            }
        );
    }

    #[test]
    fn test_invalid_source_type() {
        let json = r#"[{"source": "a", "content": "b", "type": "video"}]"#;
        let err = parse_research_results(json).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidSourceType {
                index: 0,
                value: "\"video\"".into(),
            }
        );
    }

    #[test]
    fn test_non_string_fields() {
        let json = r#"[{"source": 42, "content": "b", "type": "web"}]"#;
        let err = parse_research_results(json).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FieldType {
                index: 0,
                field: "source".into(),
            }
        );

        let json = r#"[{"source": "a", "content": ["b"], "type": "web"}]"#;
        let err = parse_research_results(json).unwrap_err();
        assert!(matches!(err, ValidationError::FieldType { field, .. } if field == "content"));
    }

    #[test]
    fn test_empty_content_rejected() {
        let json = r#"[{"source": "a", "content": "  ", "type": "web"}]"#;
        let err = parse_research_results(json).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField { index: 0, .. }));
    }

    #[test]
    fn test_format_synthesis_lists_sources_in_order() {
        let sources = vec![
            Source::web("https://first.example", "first finding"),
            Source::document("notes.md", "second finding"),
        ];
        let report = format_synthesis(&sources);
        assert!(report.starts_with("Research Complete - Findings Summary"));
        assert!(report.contains("Total Sources Gathered: 2"));
        let first = report.find("[Source 1]\nType: web\nSource: https://first.example").unwrap();
        let second = report.find("[Source 2]\nType: document\nSource: notes.md").unwrap();
        assert!(first < second);
        assert!(report.ends_with("Iteration Limit: Reached"));
    }

    #[test]
    fn test_format_synthesis_empty() {
        let report = format_synthesis(&[]);
        assert!(report.contains("Total Sources Gathered: 0"));
        assert!(!report.contains("[Source"));
    }

    #[test]
    fn test_source_serializes_type_key() {
        let json = serde_json::to_value(Source::web("u", "c")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"source": "u", "content": "c", "type": "web"})
        );
    }
}
