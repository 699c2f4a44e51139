//! Query execution
//!
//! Runs guard-approved statements against the ledger with a hard runtime
//! budget. Execution failure is a value, not an error: callers get
//! [`ExecutionOutcome::Failed`] and the driver detail stays in the server
//! log. An empty result set is a success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use std::time::Duration;
use tracing::{error, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Ordered columns plus one JSON object per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in select-list order. Empty when the statement matched
    /// no rows, because the driver reports no metadata then.
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(QueryResult),
    Failed,
}

/// Execution seam between the pipeline and the database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> ExecutionOutcome;
}

/// Executor backed by the MySQL ledger. Opens a fresh connection per
/// statement so a failed query can never leak session state, and caps each
/// statement with `max_execution_time` so a runaway query is killed
/// server-side.
pub struct MySqlExecutor {
    database_url: String,
    budget_ms: u64,
}

impl MySqlExecutor {
    pub fn new(database_url: impl Into<String>, budget_ms: u64) -> Self {
        Self {
            database_url: database_url.into(),
            budget_ms,
        }
    }

    async fn run(&self, sql: &str) -> std::result::Result<QueryResult, sqlx::Error> {
        let connect = MySqlConnection::connect(&self.database_url);
        let mut conn = tokio::time::timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| {
                sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "ledger connection timed out",
                ))
            })??;
        let budget = session_budget_statement(self.budget_ms);
        sqlx::query(&budget).execute(&mut conn).await?;
        let rows = sqlx::query(sql).fetch_all(&mut conn).await?;
        let result = collect_rows(&rows);
        let _ = conn.close().await;
        Ok(result)
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn execute(&self, sql: &str) -> ExecutionOutcome {
        info!(%sql, "executing ledger query");
        match self.run(sql).await {
            Ok(result) => {
                info!(rows = result.rows.len(), "query succeeded");
                ExecutionOutcome::Success(result)
            }
            Err(e) => {
                // The SQL and the driver error go to the log only; user-facing
                // surfaces get a generic message from the pipeline.
                error!(%sql, error = %e, "query execution failed");
                ExecutionOutcome::Failed
            }
        }
    }
}

/// The server-side ceiling set before every statement. `max_execution_time`
/// is in milliseconds and applies to SELECTs only, which is all the guard
/// ever lets through.
fn session_budget_statement(budget_ms: u64) -> String {
    format!("SET SESSION max_execution_time={}", budget_ms)
}

fn collect_rows(rows: &[MySqlRow]) -> QueryResult {
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let mapped = rows
        .iter()
        .map(|row| {
            let mut entry = Map::new();
            for (idx, column) in row.columns().iter().enumerate() {
                entry.insert(column.name().to_string(), decode_cell(row, idx));
            }
            entry
        })
        .collect();

    QueryResult {
        columns,
        rows: mapped,
    }
}

/// Decode one cell into JSON by the column's declared MySQL type. Anything
/// unrecognized falls back to its textual form, and anything undecodable
/// becomes `null` rather than failing the whole result set.
fn decode_cell(row: &MySqlRow, idx: usize) -> Value {
    let type_name = row.column(idx).type_info().name();
    let decoded = match type_name {
        "BOOLEAN" => opt(row.try_get::<Option<bool>, _>(idx)).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            opt(row.try_get::<Option<i64>, _>(idx)).map(Value::from)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => opt(row.try_get::<Option<u64>, _>(idx)).map(Value::from),
        "FLOAT" => opt(row.try_get::<Option<f32>, _>(idx)).map(|v| json_number(f64::from(v))),
        "DOUBLE" => opt(row.try_get::<Option<f64>, _>(idx)).map(json_number),
        // DECIMAL sums and averages should read as numbers, not strings.
        "DECIMAL" => text_cell(row, idx).map(|text| match text.parse::<f64>() {
            Ok(v) => json_number(v),
            Err(_) => Value::String(text),
        }),
        "DATE" => opt(row.try_get::<Option<chrono::NaiveDate>, _>(idx))
            .map(|d| Value::String(d.to_string()))
            .or_else(|| text_cell(row, idx).map(Value::String)),
        "DATETIME" | "TIMESTAMP" => opt(row.try_get::<Option<chrono::NaiveDateTime>, _>(idx))
            .map(|d| Value::String(d.to_string()))
            .or_else(|| text_cell(row, idx).map(Value::String)),
        "TIME" => opt(row.try_get::<Option<chrono::NaiveTime>, _>(idx))
            .map(|t| Value::String(t.to_string()))
            .or_else(|| text_cell(row, idx).map(Value::String)),
        _ => text_cell(row, idx).map(Value::String),
    };
    decoded.unwrap_or(Value::Null)
}

fn opt<T>(value: std::result::Result<Option<T>, sqlx::Error>) -> Option<T> {
    value.ok().flatten()
}

fn text_cell(row: &MySqlRow, idx: usize) -> Option<String> {
    row.try_get_unchecked::<Option<String>, _>(idx).ok().flatten()
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_is_success_shaped() {
        let result = QueryResult::default();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
        assert_eq!(ExecutionOutcome::Success(result.clone()), ExecutionOutcome::Success(result));
    }

    #[test]
    fn test_query_result_serializes_in_column_order() {
        let mut row = Map::new();
        row.insert("categoryName".to_string(), Value::String("Fuel".to_string()));
        row.insert("total".to_string(), serde_json::json!(88.2));
        let result = QueryResult {
            columns: vec!["categoryName".to_string(), "total".to_string()],
            rows: vec![row],
        };
        let json = serde_json::to_string(&result).unwrap();
        // Look inside the serialized row object, not the columns list.
        let row_json = &json[json.find("rows").unwrap()..];
        let category_pos = row_json.find("categoryName").unwrap();
        let total_pos = row_json.find("total").unwrap();
        assert!(category_pos < total_pos, "row key order lost: {}", json);
    }

    #[test]
    fn test_json_number_guards_non_finite() {
        assert_eq!(json_number(2.5), serde_json::json!(2.5));
        assert_eq!(json_number(f64::NAN), Value::Null);
        assert_eq!(json_number(f64::INFINITY), Value::Null);
    }

    #[test]
    fn test_session_budget_statement_shape() {
        assert_eq!(
            session_budget_statement(1000),
            "SET SESSION max_execution_time=1000"
        );
        assert_eq!(
            session_budget_statement(250),
            "SET SESSION max_execution_time=250"
        );
    }
}
