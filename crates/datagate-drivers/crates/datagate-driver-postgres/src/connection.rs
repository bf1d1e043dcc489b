//! PostgreSQL connection implementation

use datagate_core::{
    DriverError, DriverResult, NativeConnection, QueryResult, Row, Value, runtime,
};
use postgres_types::{ToSql, Type};
use tokio::runtime::Runtime;
use tokio_postgres::{Client, NoTls};

use crate::rewrite_placeholders;
use crate::types::{PgValue, postgres_to_value};

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match code.code() {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "42P01" => format!("undefined table: {}", message),
        "42703" => format!("undefined column: {}", message),
        _ => format!("{} (code: {})", message, code.code()),
    }
}

/// PostgreSQL connection wrapper
///
/// The tokio-postgres connection future is spawned on the connection's own
/// current-thread runtime, so it only makes progress while a call blocks.
pub struct PostgresConnection {
    runtime: Runtime,
    client: Client,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    pub fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<Self> {
        tracing::info!(host = %host, port = %port, database = %database, "connecting to PostgreSQL database");

        let mut config = tokio_postgres::Config::new();
        config.host(host).port(port).dbname(database);
        if let Some(u) = user {
            config.user(u);
        }
        if let Some(p) = password {
            config.password(p);
        }

        let runtime = runtime::connection_runtime()?;
        let (client, connection) = runtime.block_on(config.connect(NoTls)).map_err(|e| {
            DriverError::new(format!(
                "Failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        })?;

        runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        tracing::info!(host = %host, port = %port, database = %database, "PostgreSQL connection established");
        Ok(Self { runtime, client })
    }

    fn batch(&mut self, sql: &'static str) -> DriverResult<()> {
        let Self { runtime, client } = self;
        runtime.block_on(client.batch_execute(sql)).map_err(|e| {
            DriverError::new(format!("Failed to run '{}': {}", sql, format_postgres_error(&e)))
        })
    }
}

async fn run_statement(
    client: &Client,
    sql: &str,
    params: &[Value],
) -> DriverResult<(Vec<String>, Vec<Row>, u64)> {
    // Prepare first so we know the target type of each parameter
    let statement = client.prepare(sql).await.map_err(|e| {
        DriverError::new(format!("Failed to prepare query: {}", format_postgres_error(&e)))
    })?;

    let param_types = statement.params();
    let pg_params: Vec<PgValue> = params
        .iter()
        .enumerate()
        .map(|(i, value)| {
            PgValue::from_value_for_type(value, param_types.get(i).unwrap_or(&Type::UNKNOWN))
        })
        .collect();
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let column_names: Vec<String> = statement
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    if column_names.is_empty() {
        let affected = client.execute(&statement, &param_refs).await.map_err(|e| {
            DriverError::new(format!("Failed to execute statement: {}", format_postgres_error(&e)))
        })?;
        return Ok((column_names, Vec::new(), affected));
    }

    let pg_rows = client.query(&statement, &param_refs).await.map_err(|e| {
        DriverError::new(format!("Failed to execute query: {}", format_postgres_error(&e)))
    })?;

    let rows = pg_rows
        .iter()
        .map(|pg_row| {
            let values = (0..column_names.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect();
            Row::new(column_names.clone(), values)
        })
        .collect();

    Ok((column_names, rows, 0))
}

impl NativeConnection for PostgresConnection {
    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<QueryResult> {
        let start_time = std::time::Instant::now();
        let sql = rewrite_placeholders(sql);

        let Self { runtime, client } = self;
        let (column_names, rows, affected_rows) =
            runtime.block_on(run_statement(client, &sql, params))?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            affected_rows,
            execution_time_ms,
            "statement executed"
        );
        Ok(QueryResult::new(column_names, rows, affected_rows).with_execution_time(execution_time_ms))
    }

    /// Value of the most recently advanced sequence in this session
    fn last_insert_id(&mut self) -> DriverResult<Value> {
        let mut result = self.execute("SELECT lastval() AS id", &[])?;
        Ok(result
            .fetch()
            .and_then(|row| row.get(0).cloned())
            .unwrap_or(Value::Null))
    }

    fn begin_transaction(&mut self) -> DriverResult<()> {
        tracing::debug!("beginning PostgreSQL transaction");
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> DriverResult<()> {
        tracing::debug!("committing PostgreSQL transaction");
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> DriverResult<()> {
        tracing::debug!("rolling back PostgreSQL transaction");
        self.batch("ROLLBACK")
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        tracing::info!("closing PostgreSQL connection");
        let Self { runtime, client } = *self;
        // dropping the client ends the connection task, which the runtime then reaps
        drop(client);
        drop(runtime);
        Ok(())
    }
}
