//! SQLite query executor with outcome classification.

use analytica_workflow::{
    ExecutionErrorKind, ExecutionOutcome, QueryExecutor, Result, SchemaDescriptor,
};
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Executor over a SQLite database. The connection is pooled behind a
/// mutex and borrowed per call, never held across stages.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    /// Open the database read-only: generated queries must never mutate
    /// the dataset, and a write attempt classifies as access-denied.
    pub fn open_read_only(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open_with_flags(
            db_path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening database {}", db_path.as_ref().display()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run setup statements (fixtures, demo data). Not part of the
    /// executor contract.
    pub fn execute_batch(&self, sql: &str) -> anyhow::Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(sql)
            .context("executing setup batch")?;
        Ok(())
    }

    fn run_sync(&self, query: &str) -> ExecutionOutcome {
        let conn = self.conn.lock().unwrap();

        let mut stmt = match conn.prepare(query) {
            Ok(stmt) => stmt,
            Err(e) => return failure_from(&e),
        };
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = Vec::new();
        let mut cursor = match stmt.query([]) {
            Ok(cursor) => cursor,
            Err(e) => return failure_from(&e),
        };
        loop {
            match cursor.next() {
                Ok(Some(row)) => {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(match row.get_ref(i) {
                            Ok(value) => json_value(value),
                            Err(e) => return failure_from(&e),
                        });
                    }
                    rows.push(values);
                }
                Ok(None) => break,
                Err(e) => return failure_from(&e),
            }
        }

        debug!(rows = rows.len(), "query executed");
        ExecutionOutcome::Rows { columns, rows }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn run(&self, query: &str) -> Result<ExecutionOutcome> {
        // SQLite work runs on the blocking pool so a slow query neither
        // stalls a runtime worker nor outlives the caller's stage deadline.
        let executor = self.clone();
        let query = query.to_string();
        let outcome = tokio::task::spawn_blocking(move || executor.run_sync(&query))
            .await
            .map_err(|e| anyhow::anyhow!("executor worker failed: {}", e))?;
        Ok(outcome)
    }

    async fn describe_schema(&self) -> Result<SchemaDescriptor> {
        let executor = self.clone();
        let schema = tokio::task::spawn_blocking(move || executor.describe_schema_sync())
            .await
            .map_err(|e| anyhow::anyhow!("executor worker failed: {}", e))??;
        Ok(schema)
    }
}

impl SqliteExecutor {
    fn describe_schema_sync(&self) -> Result<SchemaDescriptor> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT sql FROM sqlite_master
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| anyhow::anyhow!("reading sqlite_master: {}", e))?;
        let statements: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| anyhow::anyhow!("reading sqlite_master: {}", e))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(SchemaDescriptor(statements.join("\n\n")))
    }
}

fn failure_from(e: &rusqlite::Error) -> ExecutionOutcome {
    ExecutionOutcome::Failure {
        kind: classify_sqlite_error(e),
        message: e.to_string(),
    }
}

/// Map a sqlite error onto the workflow's outcome taxonomy.
pub fn classify_sqlite_error(e: &rusqlite::Error) -> ExecutionErrorKind {
    use rusqlite::ffi::ErrorCode;

    if let rusqlite::Error::SqliteFailure(inner, _) = e {
        match inner.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::OperationInterrupted => return ExecutionErrorKind::Timeout,
            ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied
            | ErrorCode::AuthorizationForStatementDenied => {
                return ExecutionErrorKind::AccessDenied
            }
            _ => {}
        }
    }

    let message = e.to_string().to_lowercase();
    if message.contains("syntax error") {
        ExecutionErrorKind::Syntax
    } else if message.contains("no such table")
        || message.contains("no such column")
        || message.contains("ambiguous column name")
    {
        ExecutionErrorKind::SchemaMismatch
    } else if message.contains("readonly") {
        ExecutionErrorKind::AccessDenied
    } else {
        ExecutionErrorKind::Unknown
    }
}

fn json_value(value: rusqlite::types::ValueRef<'_>) -> serde_json::Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SqliteExecutor {
        let executor = SqliteExecutor::in_memory().unwrap();
        executor
            .execute_batch(
                "CREATE TABLE Orders (
                    OrderID INTEGER PRIMARY KEY,
                    CustomerID TEXT NOT NULL,
                    OrderDate TEXT NOT NULL,
                    Freight REAL NOT NULL
                 );
                 CREATE TABLE [Order Details] (
                    OrderID INTEGER NOT NULL,
                    ProductID INTEGER NOT NULL,
                    UnitPrice REAL NOT NULL,
                    Quantity INTEGER NOT NULL
                 );
                 INSERT INTO Orders VALUES (1, 'ALFKI', '1997-08-25', 29.46);
                 INSERT INTO Orders VALUES (2, 'ANATR', '1997-09-18', 13.84);
                 INSERT INTO [Order Details] VALUES (1, 11, 14.0, 12);",
            )
            .unwrap();
        executor
    }

    #[tokio::test]
    async fn test_rows_with_columns() {
        let executor = fixture();
        let outcome = executor
            .run("SELECT OrderID, Freight FROM Orders ORDER BY OrderID")
            .await
            .unwrap();

        match outcome {
            ExecutionOutcome::Rows { columns, rows } => {
                assert_eq!(columns, vec!["OrderID", "Freight"]);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][0], serde_json::json!(1));
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_syntax_error_classified() {
        let executor = fixture();
        let outcome = executor.run("SELEC * FROM Orders").await.unwrap();
        assert_eq!(outcome.error_kind(), Some(ExecutionErrorKind::Syntax));
    }

    #[tokio::test]
    async fn test_schema_mismatch_classified() {
        let executor = fixture();

        let outcome = executor.run("SELECT * FROM Ordes").await.unwrap();
        assert_eq!(
            outcome.error_kind(),
            Some(ExecutionErrorKind::SchemaMismatch)
        );

        let outcome = executor.run("SELECT Freightt FROM Orders").await.unwrap();
        assert_eq!(
            outcome.error_kind(),
            Some(ExecutionErrorKind::SchemaMismatch)
        );
    }

    #[tokio::test]
    async fn test_bracketed_table_names() {
        let executor = fixture();
        let outcome = executor
            .run("SELECT COUNT(*) FROM [Order Details]")
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.row_count(), 1);
    }

    #[tokio::test]
    async fn test_describe_schema_lists_create_statements() {
        let executor = fixture();
        let schema = executor.describe_schema().await.unwrap();
        assert!(schema.as_str().contains("CREATE TABLE Orders"));
        assert!(schema.as_str().contains("Order Details"));
    }

    #[tokio::test]
    async fn test_empty_result_is_success() {
        let executor = fixture();
        let outcome = executor
            .run("SELECT * FROM Orders WHERE OrderID = 999")
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.row_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_query_is_preemptible_by_deadline() {
        let executor = fixture();
        // Large recursive CTE keeps SQLite busy well past the deadline.
        let slow = "WITH RECURSIVE c(x) AS (
                        SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 20000000
                    ) SELECT COUNT(*) FROM c";

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), executor.run(slow)).await;
        assert!(result.is_err(), "deadline never fired on a blocking query");
    }

    #[test]
    fn test_classify_busy_as_timeout() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert_eq!(classify_sqlite_error(&err), ExecutionErrorKind::Timeout);
    }

    #[test]
    fn test_classify_readonly_as_access_denied() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            Some("attempt to write a readonly database".to_string()),
        );
        assert_eq!(
            classify_sqlite_error(&err),
            ExecutionErrorKind::AccessDenied
        );
    }
}
