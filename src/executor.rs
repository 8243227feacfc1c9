//! Query Executor - runs the generated SQL against the sales database.
//!
//! Execution errors are swallowed on purpose: a broken generated statement
//! and a genuinely empty result both come back as an empty [`ResultSet`],
//! and only the error log tells them apart. The shaper renders both as "no
//! data". Known trade-off, kept as-is so the chat never surfaces raw SQL
//! errors to the dashboard.

use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use std::collections::HashMap;
use tracing::{debug, error};

/// Ordered result of one SQL statement.
///
/// `columns` preserves the emission order of the store. The shaper assigns
/// label/series roles positionally from this list, never from row key order;
/// it is the explicit contract between the generated query and the shaping
/// step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, Value>>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Seam between the pipeline and the relational store.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Execute `query` as-is. Implementations must not fail: any execution
    /// error degrades to an empty result.
    async fn run(&self, query: &str) -> ResultSet;
}

/// Production executor over a bounded MySQL pool. A connection is checked
/// out only for the duration of one statement, never across LLM calls.
pub struct SqlExecutor {
    pool: MySqlPool,
}

impl SqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn try_execute(&self, query: &str) -> Result<ResultSet> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows.iter().map(row_to_json).collect();

        Ok(ResultSet { columns, rows })
    }
}

#[async_trait]
impl QueryRunner for SqlExecutor {
    async fn run(&self, query: &str) -> ResultSet {
        match self.try_execute(query).await {
            Ok(result) => {
                debug!(rows = result.rows.len(), "requête SQL exécutée");
                result
            }
            Err(e) => {
                error!("Erreur SQL: {}", e);
                ResultSet::empty()
            }
        }
    }
}

fn row_to_json(row: &MySqlRow) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, idx, column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

/// Decode one MySQL cell into a JSON scalar. Temporal values become ISO
/// strings, DECIMAL becomes a float, anything unknown falls back to its
/// string form.
fn decode_cell(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => row
            .try_get::<Option<u64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .map(|f| Value::from(f as f64))
            .unwrap_or(Value::Null),
        "DOUBLE" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "DECIMAL" => row
            .try_get::<Option<Decimal>, _>(idx)
            .ok()
            .flatten()
            .and_then(|d| d.to_f64())
            .map(Value::from)
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::from(d.to_string()))
            .unwrap_or(Value::Null),
        "DATETIME" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::from(d.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::from(d.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .ok()
            .flatten()
            .map(|t| Value::from(t.to_string()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}
