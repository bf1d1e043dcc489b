//! SQLite connection implementation

use datagate_core::{DriverError, DriverResult, NativeConnection, QueryResult, Row, Value};
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: RusqliteConnection,
}

impl SqliteConnection {
    /// Open a SQLite database and enable foreign-key enforcement
    pub fn open(path: &str) -> DriverResult<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                DriverError::new(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                DriverError::new(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?
        };

        // PRAGMA commands return results, so use pragma_update
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DriverError::new(format!("Failed to enable foreign keys: {}", e)))?;

        tracing::info!(path = %path, "SQLite database connection established");
        Ok(Self { conn })
    }

    /// Borrow the underlying rusqlite connection
    pub fn inner(&self) -> &RusqliteConnection {
        &self.conn
    }
}

impl NativeConnection for SqliteConnection {
    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<QueryResult> {
        let start_time = std::time::Instant::now();
        let rusqlite_params = values_to_rusqlite(params);
        let total_before = self.conn.total_changes();

        let (column_names, rows) = {
            let mut stmt = self
                .conn
                .prepare(sql)
                .map_err(|e| DriverError::new(format!("Failed to prepare query: {}", e)))?;

            let column_names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();

            let mut rows = Vec::new();
            let mut query_rows = stmt
                .query(params_from_iter(rusqlite_params.iter()))
                .map_err(|e| DriverError::new(format!("Failed to execute query: {}", e)))?;

            while let Some(row) = query_rows
                .next()
                .map_err(|e| DriverError::new(format!("Failed to fetch row: {}", e)))?
            {
                let mut values = Vec::with_capacity(column_names.len());
                for i in 0..column_names.len() {
                    values.push(rusqlite_to_value(row, i)?);
                }
                rows.push(Row::new(column_names.clone(), values));
            }

            (column_names, rows)
        };

        // changes() keeps the count of the last DML statement, so it is only
        // read when this statement moved the running total
        let affected_rows =
            if column_names.is_empty() && self.conn.total_changes() != total_before {
                self.conn.changes()
            } else {
                0
            };
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        tracing::debug!(
            row_count = rows.len(),
            affected_rows,
            execution_time_ms,
            "statement executed"
        );
        Ok(QueryResult::new(column_names, rows, affected_rows).with_execution_time(execution_time_ms))
    }

    fn last_insert_id(&mut self) -> DriverResult<Value> {
        Ok(Value::Int64(self.conn.last_insert_rowid()))
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        tracing::debug!("beginning SQLite transaction");
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| DriverError::new(format!("Failed to begin transaction: {}", e)))
    }

    fn commit(&mut self) -> DriverResult<()> {
        tracing::debug!("committing SQLite transaction");
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| DriverError::new(format!("Failed to commit transaction: {}", e)))
    }

    fn rollback(&mut self) -> DriverResult<()> {
        tracing::debug!("rolling back SQLite transaction");
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| DriverError::new(format!("Failed to rollback transaction: {}", e)))
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        tracing::info!("closing SQLite connection");
        self.conn
            .close()
            .map_err(|(_, e)| DriverError::new(format!("Failed to close SQLite connection: {}", e)))
    }
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

/// SQLite has no parameter coercion; every value is stored with its own storage class
fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int16(i) => rusqlite::types::Value::Integer(*i as i64),
        Value::Int32(i) => rusqlite::types::Value::Integer(*i as i64),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float32(f) => rusqlite::types::Value::Real(*f as f64),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::Decimal(d) => rusqlite::types::Value::Text(d.clone()),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Date(d) => rusqlite::types::Value::Text(d.to_string()),
        Value::Time(t) => rusqlite::types::Value::Text(t.to_string()),
        Value::DateTime(dt) => {
            rusqlite::types::Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())
        }
        Value::DateTimeUtc(dt) => rusqlite::types::Value::Text(dt.to_rfc3339()),
        Value::Json(j) => rusqlite::types::Value::Text(j.to_string()),
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> DriverResult<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| DriverError::new(format!("Failed to read column {}: {}", idx, e)))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}
