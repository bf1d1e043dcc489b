//! MySQL driver implementation

use datagate_core::{
    DbType, DriverResult, Fragment, NativeConnection, SqlDriver, SqlParams, build_server_dsn,
};

use crate::MySqlConnection;

/// Default MySQL port
pub const DEFAULT_PORT: u16 = 3306;

/// MySQL/MariaDB database driver
pub struct MySqlDriver;

impl MySqlDriver {
    /// Create a new MySQL driver instance
    pub fn new() -> Self {
        tracing::debug!("MySQL driver initialized");
        Self
    }
}

impl Default for MySqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDriver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn dbtype(&self) -> DbType {
        DbType::Mysql
    }

    /// Credentials are passed to the native connect, never written into the DSN
    fn build_connection_string(&self, params: &SqlParams) -> String {
        build_server_dsn(params)
    }

    #[tracing::instrument(skip(self, params), fields(host = ?params.host(), database = %params.dbname))]
    fn connect(&self, params: &SqlParams) -> DriverResult<Box<dyn NativeConnection>> {
        let host = params.host().unwrap_or("localhost");
        let port = params.port_number()?.unwrap_or(DEFAULT_PORT);

        let conn = MySqlConnection::connect(
            host,
            port,
            &params.dbname,
            params.user(),
            params.password(),
        )
        .inspect_err(|e| {
            tracing::error!(error = %e, "failed to connect to MySQL");
        })?;

        Ok(Box::new(conn))
    }

    fn fragment(&self, fragment: Fragment) -> String {
        match fragment {
            Fragment::Engine => "ENGINE=InnoDB".to_string(),
            Fragment::Index => "INTEGER PRIMARY KEY AUTO_INCREMENT".to_string(),
            Fragment::Datetime { delta } => {
                let (sign, secs) = Fragment::signed(delta);
                format!(
                    "(date_add(utc_timestamp(), interval {}{} second))",
                    sign, secs
                )
            }
        }
    }

    fn epoch_query(&self) -> &'static str {
        "SELECT UNIX_TIMESTAMP() AS now"
    }
}
