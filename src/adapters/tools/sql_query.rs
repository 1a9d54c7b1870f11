//! SQL query tool.
//!
//! Runs a query against a sqlite database and returns the rows as JSON
//! objects. Failures of any kind (bad SQL, missing table, unreadable
//! file) come back as a structured error outcome; nothing raises past
//! the tool boundary.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo};
use std::path::Path;

use crate::domain::ports::{InputSchema, Tool, ToolOutcome};

/// Tool that executes SQL against a sqlite database file.
pub struct SqlQueryTool {
    pool: SqlitePool,
}

impl SqlQueryTool {
    /// Open the database read-write, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        // One connection for in-memory databases, which are per-connection.
        let in_memory = path.as_ref().as_os_str() == ":memory:";
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 2 })
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an already-open pool, for sharing a database with other tools.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_json(row: &SqliteRow) -> Value {
        let mut object = Map::new();
        for column in row.columns() {
            let name = column.name();
            // sqlite is dynamically typed per cell, so probe the common
            // decodings in order instead of trusting the declared type.
            let value = if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
                v.map_or(Value::Null, Value::from)
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
                v.map_or(Value::Null, Value::from)
            } else if let Ok(v) = row.try_get::<Option<String>, _>(name) {
                v.map_or(Value::Null, Value::from)
            } else {
                Value::String(format!("<{}>", column.type_info().name()))
            };
            object.insert(name.to_string(), value);
        }
        Value::Object(object)
    }
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> &str {
        "sql_query"
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the working sqlite database and return the rows as JSON"
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::single_string("query")
    }

    async fn invoke(&self, args: Value) -> ToolOutcome {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return ToolOutcome::Error("missing required argument 'query'".to_string());
        };

        match sqlx::query(query).fetch_all(&self.pool).await {
            Ok(rows) => {
                let rows: Vec<Value> = rows.iter().map(Self::row_to_json).collect();
                ToolOutcome::Success(serde_json::json!({
                    "rows": rows,
                    "row_count": rows.len(),
                }))
            }
            Err(e) => ToolOutcome::Error(format!("query failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded_tool() -> SqlQueryTool {
        let tool = SqlQueryTool::open(":memory:").await.unwrap();
        sqlx::query("CREATE TABLE fruit (name TEXT, qty INTEGER, price REAL)")
            .execute(tool.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO fruit VALUES ('apple', 3, 1.5), ('pear', 7, 0.8)")
            .execute(tool.pool())
            .await
            .unwrap();
        tool
    }

    #[tokio::test]
    async fn returns_rows_as_json_objects() {
        let tool = seeded_tool().await;
        let outcome = tool
            .invoke(json!({"query": "SELECT name, qty FROM fruit ORDER BY name"}))
            .await;
        let ToolOutcome::Success(payload) = outcome else {
            panic!("expected success");
        };
        assert_eq!(payload["row_count"], 2);
        assert_eq!(payload["rows"][0]["name"], "apple");
        assert_eq!(payload["rows"][0]["qty"], 3);
    }

    #[tokio::test]
    async fn malformed_query_is_an_error_value() {
        let tool = seeded_tool().await;
        let outcome = tool.invoke(json!({"query": "SELEKT * FROM fruit"})).await;
        assert!(outcome.is_error());
        assert!(outcome.to_json()["error"].as_str().unwrap().contains("query failed"));
    }

    #[tokio::test]
    async fn missing_argument_is_an_error_value() {
        let tool = seeded_tool().await;
        assert!(tool.invoke(json!({})).await.is_error());
    }
}
