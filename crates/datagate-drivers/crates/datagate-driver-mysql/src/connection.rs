//! MySQL connection implementation

use chrono::{Datelike, Timelike};
use datagate_core::{
    DriverError, DriverResult, NativeConnection, QueryResult, Row, Value, runtime,
};
use mysql_async::{Conn, Opts, OptsBuilder, Params, Row as MySqlRow, consts::ColumnType, prelude::*};
use tokio::runtime::Runtime;

/// MySQL connection wrapper
///
/// mysql_async needs a Tokio reactor, so every connection carries a
/// current-thread runtime and blocks on it for each call.
pub struct MySqlConnection {
    runtime: Runtime,
    conn: Conn,
}

impl MySqlConnection {
    /// Connect to a MySQL database
    pub fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<Self> {
        tracing::info!(host = %host, port = %port, database = %database, "connecting to MySQL database");

        let mut opts_builder = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(host)
            .tcp_port(port)
            .db_name(Some(database));

        if let Some(u) = user {
            opts_builder = opts_builder.user(Some(u));
        }
        if let Some(p) = password {
            opts_builder = opts_builder.pass(Some(p));
        }

        let opts: Opts = opts_builder.into();
        let runtime = runtime::connection_runtime()?;
        let conn = runtime
            .block_on(Conn::new(opts))
            .map_err(|e| DriverError::new(format!("Failed to connect to MySQL: {}", e)))?;

        tracing::info!(host = %host, port = %port, database = %database, "MySQL connection established");
        Ok(Self { runtime, conn })
    }

    fn query_drop(&mut self, sql: &'static str) -> DriverResult<()> {
        let Self { runtime, conn } = self;
        runtime
            .block_on(conn.query_drop(sql))
            .map_err(|e| DriverError::new(format!("Failed to run '{}': {}", sql, e)))
    }
}

/// Bind a value for the binary protocol
fn value_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(v) => mysql_async::Value::Int(if *v { 1 } else { 0 }),
        Value::Int16(v) => mysql_async::Value::Int(*v as i64),
        Value::Int32(v) => mysql_async::Value::Int(*v as i64),
        Value::Int64(v) => mysql_async::Value::Int(*v),
        Value::Float32(v) => mysql_async::Value::Float(*v),
        Value::Float64(v) => mysql_async::Value::Double(*v),
        Value::Decimal(v) | Value::String(v) => mysql_async::Value::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => mysql_async::Value::Bytes(v.clone()),
        Value::Date(d) => mysql_async::Value::Date(
            d.year() as u16,
            d.month() as u8,
            d.day() as u8,
            0,
            0,
            0,
            0,
        ),
        Value::Time(t) => mysql_async::Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        Value::DateTime(dt) => datetime_to_mysql(dt),
        Value::DateTimeUtc(dt) => datetime_to_mysql(&dt.naive_utc()),
        Value::Json(v) => mysql_async::Value::Bytes(v.to_string().into_bytes()),
    }
}

fn datetime_to_mysql(dt: &chrono::NaiveDateTime) -> mysql_async::Value {
    mysql_async::Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

/// Convert mysql_async Value to our Value type, using column type metadata
/// to interpret byte strings.
fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => {
                    s.parse::<i64>().map(Value::Int64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&s)
                    .map(Value::Json)
                    .unwrap_or(Value::String(s)),
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => {
            if u <= i64::MAX as u64 {
                Value::Int64(u as i64)
            } else {
                Value::Decimal(u.to_string())
            }
        }
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            if col_type == ColumnType::MYSQL_TYPE_DATE {
                date.map(Value::Date).unwrap_or_else(|| {
                    Value::String(format!("{:04}-{:02}-{:02}", year, month, day))
                })
            } else {
                date.and_then(|d| d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro))
                    .map(Value::DateTime)
                    .unwrap_or_else(|| {
                        // zero dates such as 0000-00-00 have no chrono representation
                        Value::String(format!(
                            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                            year, month, day, hour, min, sec
                        ))
                    })
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

impl NativeConnection for MySqlConnection {
    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<QueryResult> {
        let start_time = std::time::Instant::now();
        let mysql_params = if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params.iter().map(value_to_mysql).collect())
        };

        let Self { runtime, conn } = self;
        let (column_names, rows, affected_rows) = runtime.block_on(async {
            let stmt = conn
                .prep(sql)
                .await
                .map_err(|e| DriverError::new(format!("Failed to prepare query: {}", e)))?;

            let column_names: Vec<String> = stmt
                .columns()
                .iter()
                .map(|col| col.name_str().to_string())
                .collect();
            let column_types: Vec<ColumnType> =
                stmt.columns().iter().map(|col| col.column_type()).collect();

            let mysql_rows: Vec<MySqlRow> = conn
                .exec(stmt, mysql_params)
                .await
                .map_err(|e| DriverError::new(format!("Failed to execute query: {}", e)))?;

            let mut rows = Vec::with_capacity(mysql_rows.len());
            for mysql_row in mysql_rows {
                let mut values = Vec::with_capacity(column_names.len());
                for (idx, col_type) in column_types.iter().enumerate() {
                    let mysql_val: mysql_async::Value =
                        mysql_row.get(idx).unwrap_or(mysql_async::Value::NULL);
                    values.push(mysql_value_to_value(mysql_val, *col_type));
                }
                rows.push(Row::new(column_names.clone(), values));
            }

            Ok::<_, DriverError>((column_names, rows, conn.affected_rows()))
        })?;

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
        Ok(self
            .conn
            .last_insert_id()
            .map(|id| Value::Int64(id as i64))
            .unwrap_or(Value::Null))
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        tracing::debug!("beginning MySQL transaction");
        self.query_drop("START TRANSACTION")
    }

    fn commit(&mut self) -> DriverResult<()> {
        tracing::debug!("committing MySQL transaction");
        self.query_drop("COMMIT")
    }

    fn rollback(&mut self) -> DriverResult<()> {
        tracing::debug!("rolling back MySQL transaction");
        self.query_drop("ROLLBACK")
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        tracing::info!("closing MySQL connection");
        let Self { runtime, conn } = *self;
        runtime
            .block_on(conn.disconnect())
            .map_err(|e| DriverError::new(format!("Failed to close MySQL connection: {}", e)))
    }
}
