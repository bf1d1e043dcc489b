//! Connection lifecycle tests for the SQL facade.
//!
//! Test categories:
//! - Opening a connection and inspecting its params
//! - Config validation order and error kinds
//! - Connect failures and their messages
//! - Close semantics

use std::sync::Arc;

use anyhow::Result;
use datagate_core::{ConnectionConfig, DbType, REDACTED, RecordingLogger, SqlErrorKind};
use datagate_drivers::{MySql, PgSql, Sql, Sqlite3};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::fixtures::{TestDriver, sql_config, test_sql};

/// Every backend reports the normalized dbtype and a matching DSN
fn connect_with_valid_config(driver: TestDriver) -> Result<()> {
    let db = test_sql(driver)?;

    let params = db.sql.get_connection_params()?;
    assert_eq!(params.dbtype, driver.dbtype());
    assert_eq!(db.sql.dbtype(), driver.dbtype());

    let dsn = db.sql.get_connection_string()?;
    let prefix = match driver {
        TestDriver::Sqlite => "sqlite:",
        TestDriver::Mysql => "mysql:dbname=",
        TestDriver::Postgres => "pgsql:dbname=",
    };
    assert!(dsn.starts_with(prefix), "unexpected DSN {}", dsn);

    assert!(db.logger.contains("SQL: object instantiated."));
    assert!(db.logger.contains("SQL: connection opened: '"));
    Ok(())
}

#[test]
fn test_connect_with_valid_config_sqlite() -> Result<()> {
    connect_with_valid_config(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_connect_with_valid_config(#[case] driver: TestDriver) -> Result<()> {
    connect_with_valid_config(driver)
}

/// `postgresql` is accepted and normalized to `pgsql`
#[test]
#[ignore = "requires docker"]
fn test_postgresql_alias() -> Result<()> {
    let (config, _dir) = sql_config(TestDriver::Postgres)?;
    let mut sql = Sql::new(
        &config.with_param("dbtype", "postgresql"),
        Arc::new(RecordingLogger::new()),
    )?;
    assert_eq!(sql.get_connection_params()?.dbtype, DbType::Pgsql);
    assert!(sql.get_connection_string()?.starts_with("pgsql:"));
    sql.close()?;
    Ok(())
}

/// Typed wrappers force their discriminator
fn typed_wrappers(driver: TestDriver) -> Result<()> {
    let (config, _dir) = sql_config(driver)?;
    let config = config.without_param("dbtype");
    let logger = Arc::new(RecordingLogger::new());

    let dbtype = match driver {
        TestDriver::Postgres => PgSql::new(&config, logger)?.dbtype(),
        TestDriver::Mysql => MySql::new(&config, logger)?.dbtype(),
        TestDriver::Sqlite => Sqlite3::new(&config, logger)?.dbtype(),
    };
    assert_eq!(dbtype, driver.dbtype());
    Ok(())
}

#[test]
fn test_typed_wrappers_sqlite() -> Result<()> {
    typed_wrappers(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_typed_wrappers(#[case] driver: TestDriver) -> Result<()> {
    typed_wrappers(driver)
}

/// Safe params never carry the password
fn safe_params_are_redacted(driver: TestDriver) -> Result<()> {
    let db = test_sql(driver)?;

    let params = db.sql.get_connection_params()?;
    let safe = db.sql.get_safe_params()?;
    assert_eq!(safe.dbname, params.dbname);
    match &params.dbpass {
        Some(_) => assert_eq!(safe.dbpass.as_deref(), Some(REDACTED)),
        None => assert_eq!(safe.dbpass, None),
    }

    if let Some(password) = params.password() {
        assert!(!db.logger.contains(password), "password leaked into the log");
    }
    Ok(())
}

#[test]
fn test_safe_params_are_redacted_sqlite() -> Result<()> {
    safe_params_are_redacted(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_safe_params_are_redacted(#[case] driver: TestDriver) -> Result<()> {
    safe_params_are_redacted(driver)
}

/// Validation happens before any connect attempt, in a fixed order
#[rstest]
#[case::missing_dbtype(vec![("dbname", "x")], SqlErrorKind::ConnectionArgs)]
#[case::missing_dbname(vec![("dbtype", "sqlite3")], SqlErrorKind::ConnectionArgs)]
#[case::empty_dbname(vec![("dbtype", "sqlite3"), ("dbname", "")], SqlErrorKind::ConnectionArgs)]
#[case::missing_both(vec![("dbhost", "localhost")], SqlErrorKind::ConnectionArgs)]
#[case::unsupported(vec![("dbtype", "oracle"), ("dbname", "x")], SqlErrorKind::DbType)]
#[case::mysql_without_user(vec![("dbtype", "mysql"), ("dbname", "x")], SqlErrorKind::ConnectionArgs)]
#[case::pgsql_without_user(vec![("dbtype", "pgsql"), ("dbname", "x")], SqlErrorKind::ConnectionArgs)]
#[case::postgresql_without_user(
    vec![("dbtype", "postgresql"), ("dbname", "x"), ("dbuser", "")],
    SqlErrorKind::ConnectionArgs
)]
fn test_invalid_config(#[case] pairs: Vec<(&str, &str)>, #[case] kind: SqlErrorKind) {
    let config = pairs
        .into_iter()
        .fold(ConnectionConfig::new(), |config, (key, value)| {
            config.with_param(key, value)
        });
    let logger = Arc::new(RecordingLogger::new());

    let err = Sql::new(&config, logger.clone()).err().expect("config should be rejected");
    assert_eq!(err.kind(), kind);
    assert_eq!(err.code(), kind.code());
    assert!(err.message().ends_with(" not supported.") || err.message().ends_with(" not supplied."));
    assert!(logger.contains("SQL: object instantiated."));
}

/// Wrong credentials surface as a credential-free CONNECTION error
#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_connect_with_invalid_credentials(#[case] driver: TestDriver) -> Result<()> {
    let (config, _dir) = sql_config(driver)?;
    let config = config
        .with_param("dbuser", "wrong_user")
        .with_param("dbpass", "wrong_password");
    let logger = Arc::new(RecordingLogger::new());

    let err = Sql::new(&config, logger.clone())
        .err()
        .expect("connection should fail");
    assert_eq!(err.kind(), SqlErrorKind::Connection);
    assert_eq!(err.message(), format!("{} connection error.", driver.dbtype()));
    assert!(!logger.contains("wrong_password"));
    assert!(logger.contains(REDACTED));
    Ok(())
}

/// Nothing listens on port 1, so the connect is refused
#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
fn test_connect_with_closed_port(#[case] driver: TestDriver) {
    let config = ConnectionConfig::new()
        .with_param("dbtype", driver.dbtype().as_str())
        .with_param("dbname", "test")
        .with_param("dbuser", "root")
        .with_param("dbpass", "secret")
        .with_param("dbhost", "127.0.0.1")
        .with_param("dbport", 1);
    let logger = Arc::new(RecordingLogger::new());

    let err = Sql::new(&config, logger.clone())
        .err()
        .expect("connection should fail");
    assert_eq!(err.kind(), SqlErrorKind::Connection);
    assert!(logger.contains("SQL: connection failed: '"));
    assert!(!logger.contains("secret"));
}

/// Close is terminal: a second close and any later call fail with CONNECTION
fn close_is_terminal(driver: TestDriver) -> Result<()> {
    let mut db = test_sql(driver)?;

    db.sql.close()?;
    assert!(db.sql.is_closed());
    assert!(db.logger.contains("SQL: connection closed."));

    let err = db.sql.query("SELECT 1", &[]).unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Connection);

    let err = db.sql.close().unwrap_err();
    assert_eq!(err.kind(), SqlErrorKind::Connection);

    assert!(db.sql.get_connection_params().is_err());
    assert!(db.sql.get_connection_string().is_err());
    assert!(db.sql.get_safe_params().is_err());
    Ok(())
}

#[test]
fn test_close_is_terminal_sqlite() -> Result<()> {
    close_is_terminal(TestDriver::Sqlite)
}

#[rstest]
#[case::postgres(TestDriver::Postgres)]
#[case::mysql(TestDriver::Mysql)]
#[ignore = "requires docker"]
fn test_close_is_terminal(#[case] driver: TestDriver) -> Result<()> {
    close_is_terminal(driver)
}
