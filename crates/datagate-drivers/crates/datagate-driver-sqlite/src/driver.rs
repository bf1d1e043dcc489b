//! SQLite driver implementation

use datagate_core::{
    DbType, DriverResult, Fragment, NativeConnection, SqlDriver, SqlParams,
};

use crate::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn dbtype(&self) -> DbType {
        DbType::Sqlite3
    }

    fn build_connection_string(&self, params: &SqlParams) -> String {
        format!("sqlite:{}", params.dbname)
    }

    #[tracing::instrument(skip(self, params), fields(path = %params.dbname))]
    fn connect(&self, params: &SqlParams) -> DriverResult<Box<dyn NativeConnection>> {
        let conn = SqliteConnection::open(&params.dbname).inspect_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
        })?;

        tracing::info!(path = %params.dbname, "SQLite connection created");
        Ok(Box::new(conn))
    }

    fn fragment(&self, fragment: Fragment) -> String {
        match fragment {
            Fragment::Engine => String::new(),
            Fragment::Index => "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            Fragment::Datetime { delta } => {
                let (sign, secs) = Fragment::signed(delta);
                format!("(datetime('now', '{}{} second'))", sign, secs)
            }
        }
    }

    fn epoch_query(&self) -> &'static str {
        "SELECT CAST(strftime('%s', 'now') AS INTEGER) AS now"
    }
}
