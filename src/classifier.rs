//! Intent Classifier - turns a natural-language question into a structured
//! analytics request (KPI or chart) plus the SQL statement that retrieves
//! the data.

use crate::error::{AnalyticsError, Result};
use crate::llm::ChatModel;
use crate::prompts;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Kpi,
    Chart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Donut,
}

/// Structured decision produced by the model, one per request.
///
/// Immutable once parsed; the `sql_query` it carries is surfaced verbatim in
/// the final envelope whatever happens downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub output: OutputKind,
    #[serde(default)]
    pub chart_type: Option<ChartKind>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sql_query: String,
}

/// Classify the user's question against the schema context.
///
/// Any failure here (model call error, unparsable JSON, missing fields) is
/// terminal for the request: the caller renders an error envelope and no SQL
/// is ever executed. The generated statement is not validated here; that is
/// the executor's concern.
pub async fn classify(
    model: &dyn ChatModel,
    message: &str,
    schema: &str,
) -> Result<Classification> {
    let system = prompts::build_classification_prompt(schema);
    let raw = model
        .complete(&system, message)
        .await
        .map_err(|e| AnalyticsError::Classification(format!("model call failed: {}", e)))?;

    parse_classification(&raw)
}

/// Parse the model's raw reply into a [`Classification`].
pub fn parse_classification(raw: &str) -> Result<Classification> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| {
        AnalyticsError::Classification(format!(
            "invalid JSON from model: {}. Response: {}",
            e, cleaned
        ))
    })
}

/// Remove an optional Markdown code fence around a JSON payload.
///
/// Tolerates ```` ```json ````, a fence with any other language tag, and a
/// bare ```` ``` ```` on either side. Text without fences passes through
/// untouched; anything still malformed is left for the JSON parser to
/// reject.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // The opening fence may carry a language tag; the payload starts at
        // the first newline or brace, whichever comes first.
        let start = rest
            .find(|c: char| c == '\n' || c == '{' || c == '[')
            .unwrap_or(0);
        s = rest[start..].trim_start_matches('\n');
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"type": "chart", "chart_type": "pie", "title": "Ventes par catégorie", "description": "Répartition des ventes", "sql_query": "SELECT c.nom, SUM(lc.sous_total) FROM ..."}"#;

    #[test]
    fn test_strip_fence_with_language_tag() {
        let raw = format!("```json\n{}\n```", VALID);
        assert_eq!(strip_code_fences(&raw), VALID);
    }

    #[test]
    fn test_strip_bare_fence() {
        let raw = format!("```\n{}\n```", VALID);
        assert_eq!(strip_code_fences(&raw), VALID);
    }

    #[test]
    fn test_strip_fence_without_newline() {
        let raw = format!("```json{}```", VALID);
        assert_eq!(strip_code_fences(&raw), VALID);
    }

    #[test]
    fn test_no_fence_passes_through() {
        assert_eq!(strip_code_fences(&format!("  {}  ", VALID)), VALID);
    }

    #[test]
    fn test_parse_valid_classification() {
        let c = parse_classification(VALID).unwrap();
        assert_eq!(c.output, OutputKind::Chart);
        assert_eq!(c.chart_type, Some(ChartKind::Pie));
        assert_eq!(c.title, "Ventes par catégorie");
        assert!(c.sql_query.starts_with("SELECT"));
    }

    #[test]
    fn test_parse_kpi_with_null_chart_type() {
        let c = parse_classification(
            r#"{"type": "kpi", "chart_type": null, "title": "Total", "description": "", "sql_query": "SELECT COUNT(*) FROM commandes"}"#,
        )
        .unwrap();
        assert_eq!(c.output, OutputKind::Kpi);
        assert_eq!(c.chart_type, None);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_classification("désolé, je ne peux pas répondre").unwrap_err();
        assert!(matches!(err, AnalyticsError::Classification(_)));
    }

    #[test]
    fn test_parse_rejects_missing_sql_query() {
        let err =
            parse_classification(r#"{"type": "kpi", "title": "Total", "description": ""}"#)
                .unwrap_err();
        assert!(matches!(err, AnalyticsError::Classification(_)));
    }
}
