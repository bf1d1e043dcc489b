//! PostgreSQL driver implementation

use datagate_core::{
    DbType, DriverResult, Fragment, NativeConnection, SqlDriver, SqlParams, build_server_dsn,
};

use crate::PostgresConnection;

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn dbtype(&self) -> DbType {
        DbType::Pgsql
    }

    fn build_connection_string(&self, params: &SqlParams) -> String {
        let mut dsn = build_server_dsn(params);
        if let Some(user) = params.user() {
            dsn.push_str(&format!(";user={}", user));
            if let Some(password) = params.password() {
                dsn.push_str(&format!(";password={}", password));
            }
        }
        dsn
    }

    #[tracing::instrument(skip(self, params), fields(host = ?params.host(), database = %params.dbname))]
    fn connect(&self, params: &SqlParams) -> DriverResult<Box<dyn NativeConnection>> {
        let host = params.host().unwrap_or("localhost");
        let port = params.port_number()?.unwrap_or(DEFAULT_PORT);

        let conn = PostgresConnection::connect(
            host,
            port,
            &params.dbname,
            params.user(),
            params.password(),
        )
        .inspect_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL");
        })?;

        Ok(Box::new(conn))
    }

    fn fragment(&self, fragment: Fragment) -> String {
        match fragment {
            Fragment::Engine => String::new(),
            Fragment::Index => "SERIAL PRIMARY KEY".to_string(),
            Fragment::Datetime { delta } => {
                let (sign, secs) = Fragment::signed(delta);
                format!(
                    "(now() at time zone 'utc' {} interval '{} second')::timestamp(0)",
                    sign, secs
                )
            }
        }
    }

    /// The key is written as given; the server rejects unknown columns
    fn returning_clause(&self, key: Option<&str>) -> Option<String> {
        Some(format!(" RETURNING {}", key.unwrap_or("*")))
    }

    fn epoch_query(&self) -> &'static str {
        "SELECT CAST(EXTRACT(EPOCH FROM CURRENT_TIMESTAMP) AS BIGINT) AS now"
    }
}
