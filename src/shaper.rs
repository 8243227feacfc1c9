//! Result Shaper - folds raw SQL rows and the classification into the
//! response envelope the dashboard consumes.
//!
//! Pure and deterministic: identical (rows, classification) input always
//! yields an identical envelope. The only branching is on output kind and on
//! row/column cardinality.

use crate::classifier::{ChartKind, Classification, OutputKind};
use crate::executor::ResultSet;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Placeholder shown when a KPI query returned nothing.
pub const NO_DATA_LABEL: &str = "Aucune donnée";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Kpi,
    Chart,
    Error,
}

/// Unified response object returned by the pipeline regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<ChartKind>,
    pub data: EnvelopeData,
    /// Always the statement the classifier produced, unchanged by execution
    /// outcome; surfaced for auditability. Empty when classification failed.
    pub sql_query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvelopeData {
    Kpi(KpiData),
    Chart(ChartData),
    /// Error envelopes carry no payload; serializes as `null`.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiData {
    /// Single cell: raw value, display form, and the column name as label.
    Scalar {
        value: Value,
        formatted: String,
        label: String,
    },
    /// Several rows from a nominally-KPI query ("top acheteurs"), passed
    /// through verbatim.
    Items { items: Vec<HashMap<String, Value>> },
    /// One row with several columns, passed through verbatim.
    Record(HashMap<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    /// Duplicate of the first series, kept for consumers that predate
    /// multi-series charts. Always in sync with `series[0]`.
    pub values: Vec<f64>,
    pub series: Vec<Series>,
}

/// One named sequence of values sharing the label axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl ResponseEnvelope {
    /// Terminal error envelope; `description` is what the user reads.
    pub fn error(description: &str) -> Self {
        Self {
            kind: EnvelopeKind::Error,
            title: "Erreur".to_string(),
            description: description.to_string(),
            chart_type: None,
            data: EnvelopeData::None,
            sql_query: String::new(),
        }
    }
}

/// Shape an executed result according to the classification.
pub fn shape(rows: &ResultSet, classification: &Classification) -> ResponseEnvelope {
    match classification.output {
        OutputKind::Kpi => shape_kpi(rows, classification),
        OutputKind::Chart => shape_chart(rows, classification),
    }
}

fn shape_kpi(rows: &ResultSet, classification: &Classification) -> ResponseEnvelope {
    let data = if rows.rows.is_empty() {
        KpiData::Scalar {
            value: Value::from(0),
            formatted: NO_DATA_LABEL.to_string(),
            label: NO_DATA_LABEL.to_string(),
        }
    } else if rows.rows.len() == 1 {
        let row = &rows.rows[0];
        if rows.columns.len() == 1 {
            let label = rows.columns[0].clone();
            let value = row.get(&label).cloned().unwrap_or(Value::Null);
            let formatted = format_metric(&value);
            KpiData::Scalar {
                value,
                formatted,
                label,
            }
        } else {
            KpiData::Record(row.clone())
        }
    } else {
        KpiData::Items {
            items: rows.rows.clone(),
        }
    };

    ResponseEnvelope {
        kind: EnvelopeKind::Kpi,
        title: classification.title.clone(),
        description: classification.description.clone(),
        chart_type: None,
        data: EnvelopeData::Kpi(data),
        sql_query: classification.sql_query.clone(),
    }
}

fn shape_chart(rows: &ResultSet, classification: &Classification) -> ResponseEnvelope {
    let data = if rows.rows.is_empty() {
        ChartData::default()
    } else {
        // First column is always the label axis. With exactly two columns
        // the second is the single series; with more, every column after the
        // first becomes its own named series. A single-column result charts
        // against itself.
        let label_col = &rows.columns[0];
        let labels: Vec<String> = rows
            .rows
            .iter()
            .map(|row| display_label(row.get(label_col)))
            .collect();

        let series: Vec<Series> = if rows.columns.len() > 2 {
            rows.columns[1..]
                .iter()
                .map(|col| Series {
                    name: col.clone(),
                    values: column_values(rows, col),
                })
                .collect()
        } else {
            let value_col = rows.columns.get(1).unwrap_or(label_col);
            vec![Series {
                name: value_col.clone(),
                values: column_values(rows, value_col),
            }]
        };

        let values = series.first().map(|s| s.values.clone()).unwrap_or_default();

        ChartData {
            labels,
            values,
            series,
        }
    };

    ResponseEnvelope {
        kind: EnvelopeKind::Chart,
        title: classification.title.clone(),
        description: classification.description.clone(),
        chart_type: Some(classification.chart_type.unwrap_or(ChartKind::Bar)),
        data: EnvelopeData::Chart(data),
        sql_query: classification.sql_query.clone(),
    }
}

fn column_values(rows: &ResultSet, column: &str) -> Vec<f64> {
    rows.rows
        .iter()
        .map(|row| coerce_numeric(row.get(column)))
        .collect()
}

/// Coerce one cell into a chart value. Missing, null and falsy cells count
/// as zero, matching how the dashboard treats gaps in a series.
fn coerce_numeric(cell: Option<&Value>) -> f64 {
    match cell {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn display_label(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Magnitude-based display formatting for single-cell KPIs.
///
/// Whole values abbreviate above a million ("1.23M") and above a thousand
/// ("2.5K"); fractional values keep two decimals. Everything else is
/// thousands-separated. Non-numeric scalars render via their string form.
pub fn format_metric(value: &Value) -> String {
    let Some(v) = value.as_f64() else {
        return match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    };

    if v.fract() != 0.0 {
        group_thousands(&format!("{:.2}", v))
    } else if v >= 1_000_000.0 {
        format!("{:.2}M", v / 1_000_000.0)
    } else if v >= 1_000.0 {
        format!("{:.1}K", v / 1_000.0)
    } else {
        group_thousands(&format!("{:.0}", v))
    }
}

/// Insert `,` separators into the integer part of a plain decimal rendering.
fn group_thousands(s: &str) -> String {
    let (sign, unsigned) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kpi_classification(sql: &str) -> Classification {
        Classification {
            output: OutputKind::Kpi,
            chart_type: None,
            title: "Chiffre d'affaires total".to_string(),
            description: "Somme des commandes".to_string(),
            sql_query: sql.to_string(),
        }
    }

    fn chart_classification(kind: Option<ChartKind>) -> Classification {
        Classification {
            output: OutputKind::Chart,
            chart_type: kind,
            title: "Ventes par catégorie".to_string(),
            description: String::new(),
            sql_query: "SELECT ...".to_string(),
        }
    }

    fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect::<HashMap<_, _>>()
            })
            .collect();
        ResultSet { columns, rows }
    }

    #[test]
    fn test_format_metric_magnitudes() {
        assert_eq!(format_metric(&json!(1_234_567)), "1.23M");
        assert_eq!(format_metric(&json!(2_500)), "2.5K");
        assert_eq!(format_metric(&json!(42.5)), "42.50");
        assert_eq!(format_metric(&json!(42)), "42");
        assert_eq!(format_metric(&json!(45_230.5)), "45,230.50");
        assert_eq!(format_metric(&json!(999_999)), "999,999");
        assert_eq!(format_metric(&json!(0)), "0");
    }

    #[test]
    fn test_format_metric_non_numeric() {
        assert_eq!(format_metric(&json!("En attente")), "En attente");
        assert_eq!(format_metric(&Value::Null), "null");
    }

    #[test]
    fn test_kpi_single_cell() {
        let rows = result_set(&["value"], vec![vec![json!(45230.5)]]);
        let envelope = shape(&rows, &kpi_classification("SELECT SUM(total) AS value FROM commandes"));

        assert_eq!(envelope.kind, EnvelopeKind::Kpi);
        assert_eq!(envelope.sql_query, "SELECT SUM(total) AS value FROM commandes");
        match &envelope.data {
            EnvelopeData::Kpi(KpiData::Scalar {
                value,
                formatted,
                label,
            }) => {
                assert_eq!(value, &json!(45230.5));
                assert_eq!(formatted, "45,230.50");
                assert_eq!(label, "value");
            }
            other => panic!("expected scalar KPI, got {:?}", other),
        }
    }

    #[test]
    fn test_kpi_empty_result_is_not_an_error() {
        let envelope = shape(&ResultSet::empty(), &kpi_classification("SELECT ..."));

        assert_eq!(envelope.kind, EnvelopeKind::Kpi);
        match &envelope.data {
            EnvelopeData::Kpi(KpiData::Scalar {
                value,
                formatted,
                label,
            }) => {
                assert_eq!(value, &json!(0));
                assert_eq!(formatted, NO_DATA_LABEL);
                assert_eq!(label, NO_DATA_LABEL);
            }
            other => panic!("expected no-data scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_kpi_single_row_multiple_columns_passes_through() {
        let rows = result_set(
            &["nom", "total"],
            vec![vec![json!("Amine"), json!(1200)]],
        );
        let envelope = shape(&rows, &kpi_classification("SELECT ..."));

        match &envelope.data {
            EnvelopeData::Kpi(KpiData::Record(record)) => {
                assert_eq!(record.get("nom"), Some(&json!("Amine")));
                assert_eq!(record.get("total"), Some(&json!(1200)));
            }
            other => panic!("expected record KPI, got {:?}", other),
        }
    }

    #[test]
    fn test_kpi_multiple_rows_become_items() {
        let rows = result_set(
            &["nom", "total"],
            vec![
                vec![json!("Amine"), json!(1200)],
                vec![json!("Sara"), json!(900)],
            ],
        );
        let envelope = shape(&rows, &kpi_classification("SELECT ..."));

        match &envelope.data {
            EnvelopeData::Kpi(KpiData::Items { items }) => assert_eq!(items.len(), 2),
            other => panic!("expected items KPI, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_two_columns() {
        let rows = result_set(
            &["categorie", "total"],
            vec![
                vec![json!("Beauté"), json!(120)],
                vec![json!("Jeux"), json!(80)],
            ],
        );
        let envelope = shape(&rows, &chart_classification(Some(ChartKind::Pie)));

        assert_eq!(envelope.kind, EnvelopeKind::Chart);
        assert_eq!(envelope.chart_type, Some(ChartKind::Pie));
        match &envelope.data {
            EnvelopeData::Chart(chart) => {
                assert_eq!(chart.labels, vec!["Beauté", "Jeux"]);
                assert_eq!(chart.values, vec![120.0, 80.0]);
                assert_eq!(chart.series.len(), 1);
                assert_eq!(chart.series[0].name, "total");
                assert_eq!(chart.series[0].values, chart.values);
            }
            other => panic!("expected chart data, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_multi_series() {
        let rows = result_set(
            &["mois", "ventes", "retours"],
            vec![
                vec![json!("2024-01"), json!(100), json!(5)],
                vec![json!("2024-02"), json!(150), json!(8)],
            ],
        );
        let envelope = shape(&rows, &chart_classification(Some(ChartKind::Line)));

        match &envelope.data {
            EnvelopeData::Chart(chart) => {
                assert_eq!(chart.labels.len(), 2);
                assert_eq!(chart.series.len(), 2);
                assert_eq!(chart.series[0].name, "ventes");
                assert_eq!(chart.series[1].name, "retours");
                assert_eq!(chart.values, chart.series[0].values);
                for series in &chart.series {
                    assert_eq!(series.values.len(), chart.labels.len());
                }
            }
            other => panic!("expected chart data, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_empty_defaults_to_bar() {
        let envelope = shape(&ResultSet::empty(), &chart_classification(None));

        assert_eq!(envelope.kind, EnvelopeKind::Chart);
        assert_eq!(envelope.chart_type, Some(ChartKind::Bar));
        match &envelope.data {
            EnvelopeData::Chart(chart) => {
                assert!(chart.labels.is_empty());
                assert!(chart.values.is_empty());
                assert!(chart.series.is_empty());
            }
            other => panic!("expected empty chart, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_coerces_null_and_missing_cells_to_zero() {
        let rows = result_set(
            &["categorie", "total"],
            vec![
                vec![json!("Beauté"), Value::Null],
                vec![json!("Jeux"), json!("80")],
            ],
        );
        let envelope = shape(&rows, &chart_classification(Some(ChartKind::Bar)));

        match &envelope.data {
            EnvelopeData::Chart(chart) => {
                assert_eq!(chart.values, vec![0.0, 80.0]);
            }
            other => panic!("expected chart data, got {:?}", other),
        }
    }

    #[test]
    fn test_shaping_is_deterministic() {
        let rows = result_set(
            &["categorie", "total"],
            vec![vec![json!("Beauté"), json!(120)]],
        );
        let classification = chart_classification(Some(ChartKind::Donut));

        let first = shape(&rows, &classification);
        let second = shape(&rows, &classification);
        assert_eq!(first, second);
    }
}
