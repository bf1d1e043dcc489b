//! SQL facade
//!
//! `Sql` validates a connection config, opens the native handle through the
//! backend's `SqlDriver`, and offers a small statement API on top of it. The
//! backend is chosen once, at construction; nothing afterwards branches on
//! it except the `RETURNING` clause the driver contributes to inserts.

use std::sync::{Arc, LazyLock};

use datagate_core::{
    ConnectionConfig, DbType, Fragment, Inserted, Logger, NativeConnection, QueryResult, Row,
    SqlDriver, SqlError, SqlErrorKind, SqlParams, Value, args_to_json, default_logger,
};
use regex::Regex;

use crate::DriverRegistry;

/// Identifiers `table_exists` is willing to interpolate
static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z_]+$").expect("valid regex"));

/// Everything that only exists while the connection is open
struct OpenSql {
    params: SqlParams,
    connection_string: String,
    connection: Box<dyn NativeConnection>,
}

/// Connection to one relational backend.
///
/// Construction opens the connection and `close` ends it for good; a
/// closed instance rejects every further call with `CONNECTION_ERROR`.
pub struct Sql {
    logger: Arc<dyn Logger>,
    driver: Arc<dyn SqlDriver>,
    open: Option<OpenSql>,
}

impl Sql {
    /// Verify `config` and open the connection
    pub fn new(config: &ConnectionConfig, logger: Arc<dyn Logger>) -> Result<Self, SqlError> {
        Self::with_registry(config, logger, DriverRegistry::global())
    }

    /// Same as `new`, logging through `tracing`
    pub fn with_default_logger(config: &ConnectionConfig) -> Result<Self, SqlError> {
        Self::new(config, default_logger())
    }

    /// Open a connection using the drivers of a custom registry
    pub fn with_registry(
        config: &ConnectionConfig,
        logger: Arc<dyn Logger>,
        registry: &DriverRegistry,
    ) -> Result<Self, SqlError> {
        logger.debug("SQL: object instantiated.");

        let params = SqlParams::from_config(config).inspect_err(|e| {
            log_rejected_config(&*logger, config, e);
        })?;

        let Some(driver) = registry.get(params.dbtype) else {
            logger.error(&format!(
                "SQL: database not supported: '{}'.",
                params.dbtype
            ));
            return Err(SqlError::dbtype(format!("'{}' not supported.", params.dbtype)));
        };

        let connection_string = driver.build_connection_string(&params);

        let connection = match driver.connect(&params) {
            Ok(connection) => connection,
            Err(e) => {
                tracing::debug!(error = %e, dbtype = %params.dbtype, "native connect failed");
                logger.error(&format!(
                    "SQL: connection failed: '{}'.",
                    params.to_log_json()
                ));
                return Err(SqlError::connection(format!(
                    "{} connection error.",
                    params.dbtype
                )));
            }
        };

        logger.debug(&format!(
            "SQL: connection opened: '{}'.",
            params.to_log_json()
        ));

        Ok(Self {
            logger,
            driver,
            open: Some(OpenSql {
                params,
                connection_string,
                connection,
            }),
        })
    }

    /// First row of the result, if any
    pub fn query(&mut self, stmt: &str, args: &[Value]) -> Result<Option<Row>, SqlError> {
        let mut result = self.execute(stmt, args)?;
        self.logger.info(&format!(
            "SQL: query ok: {} <- '{}'.",
            stmt,
            args_to_json(args)
        ));
        Ok(result.fetch())
    }

    /// Every row of the result
    pub fn query_multiple(&mut self, stmt: &str, args: &[Value]) -> Result<Vec<Row>, SqlError> {
        let mut result = self.execute(stmt, args)?;
        self.logger.info(&format!(
            "SQL: query ok: {} <- '{}'.",
            stmt,
            args_to_json(args)
        ));
        Ok(result.fetch_all())
    }

    /// Execute one statement and hand back the buffered result.
    ///
    /// Used for DDL and for the steps of an explicit transaction:
    ///
    /// ```no_run
    /// # use datagate_drivers::{ConnectionConfig, Sql};
    /// # fn run(sql: &mut Sql) -> Result<(), datagate_drivers::SqlError> {
    /// sql.get_connection()?.begin_transaction().ok();
    /// sql.query_raw("INSERT INTO t (v) VALUES (?)", &["a".into()])?;
    /// sql.query_raw("INSERT INTO t (v) VALUES (?)", &["b".into()])?;
    /// sql.get_connection()?.commit().ok();
    /// # Ok(())
    /// # }
    /// ```
    pub fn query_raw(&mut self, stmt: &str, args: &[Value]) -> Result<QueryResult, SqlError> {
        let result = self.execute(stmt, args)?;
        self.logger.info(&format!("SQL: query raw ok: {}.", stmt));
        Ok(result)
    }

    /// Insert one row.
    ///
    /// On pgsql the statement carries a `RETURNING` clause: `key` picks the
    /// returned column, `None` returns the whole row. Other backends return
    /// the generated auto-increment key and ignore `key`.
    pub fn insert(
        &mut self,
        table: &str,
        values: &[(&str, Value)],
        key: Option<&str>,
    ) -> Result<Inserted, SqlError> {
        let args: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
        let mut stmt = insert_statement(table, values);
        let returning = self.driver.returning_clause(key);
        if let Some(clause) = &returning {
            stmt.push_str(clause);
        }

        let mut result = self.execute(&stmt, &args)?;

        let inserted = if returning.is_some() {
            let row = result.fetch().ok_or_else(|| {
                self.execution_failed(&stmt, &args, "insert returned no row")
            })?;
            match key {
                Some(_) => Inserted::Id(row.get(0).cloned().unwrap_or(Value::Null)),
                None => Inserted::Row(row),
            }
        } else {
            let id = self
                .connection_mut()?
                .connection
                .last_insert_id()
                .map_err(|e| self.execution_failed(&stmt, &args, e.message()))?;
            Inserted::Id(id)
        };

        self.logger.info(&format!(
            "SQL: insert ok: {} <- '{}'.",
            stmt,
            pairs_to_json(values)
        ));
        Ok(inserted)
    }

    /// Update matching rows; returns the number of rows affected
    pub fn update(
        &mut self,
        table: &str,
        values: &[(&str, Value)],
        where_equals: &[(&str, Value)],
    ) -> Result<u64, SqlError> {
        let stmt = update_statement(table, values, where_equals);
        let args: Vec<Value> = values
            .iter()
            .chain(where_equals)
            .map(|(_, v)| v.clone())
            .collect();

        let result = self.execute(&stmt, &args)?;
        self.logger.info(&format!(
            "SQL: update ok: {} <- '{}'.",
            stmt,
            pairs_to_json(values)
        ));
        Ok(result.affected_rows)
    }

    /// Delete matching rows; an empty filter deletes every row
    pub fn delete(&mut self, table: &str, where_equals: &[(&str, Value)]) -> Result<u64, SqlError> {
        let stmt = delete_statement(table, where_equals);
        let args: Vec<Value> = where_equals.iter().map(|(_, v)| v.clone()).collect();

        let result = self.execute(&stmt, &args)?;
        self.logger.info(&format!(
            "SQL: delete ok: {} <- '{}'.",
            stmt,
            pairs_to_json(where_equals)
        ));
        Ok(result.affected_rows)
    }

    /// Backend-specific fragment by name: `engine`, `index` or `datetime`.
    ///
    /// `datetime` reads its offset in seconds from the `delta` argument. An
    /// unknown part renders as an empty string.
    pub fn stmt_fragment(&self, part: &str, args: &[(&str, Value)]) -> String {
        Fragment::parse(part, args)
            .map(|fragment| self.fragment(fragment))
            .unwrap_or_default()
    }

    pub fn fragment(&self, fragment: Fragment) -> String {
        self.driver.fragment(fragment)
    }

    /// Whether `name` is a readable table.
    ///
    /// Names outside `[0-9a-z_]` are rejected without touching the server.
    pub fn table_exists(&mut self, name: &str) -> Result<bool, SqlError> {
        if !TABLE_NAME.is_match(name) {
            tracing::debug!(table = name, "rejected table name");
            return Ok(false);
        }

        match self.query_raw(&format!("SELECT 1 FROM {} LIMIT 1", name), &[]) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == SqlErrorKind::Execution => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Server time as a Unix timestamp
    pub fn time(&mut self) -> Result<i64, SqlError> {
        let stmt = self.driver.epoch_query();
        let now = self
            .query(stmt, &[])?
            .and_then(|row| row.get_by_name("now").and_then(Value::as_i64));
        now.ok_or_else(|| self.execution_failed(stmt, &[], "no timestamp returned"))
    }

    /// The native handle, for transactions and anything else outside the facade
    pub fn get_connection(&mut self) -> Result<&mut dyn NativeConnection, SqlError> {
        let open = self.connection_mut()?;
        Ok(open.connection.as_mut())
    }

    pub fn get_connection_string(&self) -> Result<&str, SqlError> {
        self.connection_ref().map(|open| open.connection_string.as_str())
    }

    /// Params the connection was opened with, password included
    pub fn get_connection_params(&self) -> Result<&SqlParams, SqlError> {
        self.connection_ref().map(|open| &open.params)
    }

    /// Params with the password replaced by a placeholder
    pub fn get_safe_params(&self) -> Result<SqlParams, SqlError> {
        self.connection_ref().map(|open| open.params.redacted())
    }

    /// Backend of this instance; still available after `close`
    pub fn dbtype(&self) -> DbType {
        self.driver.dbtype()
    }

    pub fn is_closed(&self) -> bool {
        self.open.is_none()
    }

    /// Release the connection. Closing twice is an error.
    pub fn close(&mut self) -> Result<(), SqlError> {
        let open = match self.open.take() {
            Some(open) => open,
            None => return Err(self.closed_error()),
        };

        if let Err(e) = open.connection.close() {
            tracing::warn!(error = %e, dbtype = %self.driver.dbtype(), "native close failed");
        }
        self.logger.debug("SQL: connection closed.");
        Ok(())
    }

    fn execute(&mut self, stmt: &str, args: &[Value]) -> Result<QueryResult, SqlError> {
        let Self {
            logger,
            driver,
            open,
        } = self;
        let Some(open) = open.as_mut() else {
            return Err(closed(&**logger, driver.dbtype()));
        };

        tracing::debug!(dbtype = %driver.dbtype(), stmt, "executing statement");
        open.connection.execute(stmt, args).map_err(|e| {
            logger.error(&format!(
                "SQL: execution failed: {} <- '{}': {}.",
                stmt,
                args_to_json(args),
                e.message()
            ));
            SqlError::execution(format!("Execution error: {}.", e.message()), stmt, args)
        })
    }

    fn connection_mut(&mut self) -> Result<&mut OpenSql, SqlError> {
        let Self {
            logger,
            driver,
            open,
        } = self;
        open.as_mut()
            .ok_or_else(|| closed(&**logger, driver.dbtype()))
    }

    fn connection_ref(&self) -> Result<&OpenSql, SqlError> {
        self.open
            .as_ref()
            .ok_or_else(|| closed(&*self.logger, self.driver.dbtype()))
    }

    fn closed_error(&self) -> SqlError {
        closed(&*self.logger, self.driver.dbtype())
    }

    fn execution_failed(&self, stmt: &str, args: &[Value], reason: &str) -> SqlError {
        self.logger.error(&format!(
            "SQL: execution failed: {} <- '{}': {}.",
            stmt,
            args_to_json(args),
            reason
        ));
        SqlError::execution(format!("Execution error: {}.", reason), stmt, args)
    }
}

fn closed(logger: &dyn Logger, dbtype: DbType) -> SqlError {
    logger.error("SQL: connection failed: connection is closed.");
    SqlError::connection(format!("{} connection error.", dbtype))
}

/// Log why a config was rejected, before the error is returned
fn log_rejected_config(logger: &dyn Logger, config: &ConnectionConfig, err: &SqlError) {
    match err.kind() {
        SqlErrorKind::DbType => logger.error(&format!(
            "SQL: database not supported: '{}'.",
            config.get_non_empty("dbtype").unwrap_or_default()
        )),
        _ => {
            // dbtype and dbname are checked before dbuser
            let key = ["dbtype", "dbname"]
                .into_iter()
                .find(|key| config.get_non_empty(key).is_none())
                .unwrap_or("dbuser");
            logger.error(&format!("SQL: param not supplied: '{}'.", key));
        }
    }
}

pub(crate) fn insert_statement(table: &str, values: &[(&str, Value)]) -> String {
    let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
    let placeholders = vec!["?"; values.len()];
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(","),
        placeholders.join(",")
    )
}

pub(crate) fn update_statement(
    table: &str,
    values: &[(&str, Value)],
    where_equals: &[(&str, Value)],
) -> String {
    let pairs: Vec<String> = values.iter().map(|(column, _)| format!("{}=?", column)).collect();
    let mut stmt = format!("UPDATE {} SET {}", table, pairs.join(","));
    push_where(&mut stmt, where_equals);
    stmt
}

pub(crate) fn delete_statement(table: &str, where_equals: &[(&str, Value)]) -> String {
    let mut stmt = format!("DELETE FROM {}", table);
    push_where(&mut stmt, where_equals);
    stmt
}

fn push_where(stmt: &mut String, where_equals: &[(&str, Value)]) {
    if where_equals.is_empty() {
        return;
    }
    let conditions: Vec<String> = where_equals
        .iter()
        .map(|(column, _)| format!("{}=?", column))
        .collect();
    stmt.push_str(" WHERE ");
    stmt.push_str(&conditions.join(" AND "));
}

/// Column/value pairs as a JSON object, for log lines
pub(crate) fn pairs_to_json(pairs: &[(&str, Value)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.to_json()))
        .collect();
    serde_json::Value::Object(map).to_string()
}
