//! Core test fixtures for parameterized facade testing.
//!
//! Tests name a backend with `TestDriver` (SQL) or `TestRedis` and ask for a
//! ready facade:
//!
//! ```rust,ignore
//! use datagate_driver_tests::fixtures::{TestDriver, test_sql};
//! use rstest::rstest;
//!
//! fn select_one(driver: TestDriver) -> anyhow::Result<()> {
//!     let mut db = test_sql(driver)?;
//!     assert!(db.sql.query("SELECT 1 AS one", &[])?.is_some());
//!     Ok(())
//! }
//!
//! #[test]
//! fn test_select_one_sqlite() -> anyhow::Result<()> {
//!     select_one(TestDriver::Sqlite)
//! }
//!
//! #[rstest]
//! #[case::postgres(TestDriver::Postgres)]
//! #[case::mysql(TestDriver::Mysql)]
//! #[ignore = "requires docker"]
//! fn test_select_one(#[case] driver: TestDriver) -> anyhow::Result<()> {
//!     select_one(driver)
//! }
//! ```
//!
//! SQLite always runs against a fresh temporary file. The server backends
//! start Docker containers on first use; their cases are `#[ignore]`d and run
//! with `cargo test -- --ignored`.
//!
//! `DATAGATE_TEST_CONFIG` may point at a JSON or TOML profile file keyed by
//! backend (`sqlite3`, `mysql`, `pgsql`, `redis`, `predis`). A profile found
//! there replaces the container for that backend.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use datagate_core::{ConfigProfiles, ConnectionConfig, DbType, RecordingLogger, RedisType};
use datagate_drivers::{RedisConn, Sql};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::test_containers::{
    mysql_container, postgres_container, redis_config_for, redis_container, sql_config_for,
};

/// SQL backend under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestDriver {
    Postgres,
    Mysql,
    Sqlite,
}

impl TestDriver {
    pub fn dbtype(&self) -> DbType {
        match self {
            TestDriver::Postgres => DbType::Pgsql,
            TestDriver::Mysql => DbType::Mysql,
            TestDriver::Sqlite => DbType::Sqlite3,
        }
    }
}

/// Redis client shape under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestRedis {
    Redis,
    Predis,
}

impl TestRedis {
    pub fn redis_type(&self) -> RedisType {
        match self {
            TestRedis::Redis => RedisType::Redis,
            TestRedis::Predis => RedisType::Predis,
        }
    }
}

/// An open SQL facade plus everything the test may want to inspect
pub struct TestSql {
    pub sql: Sql,
    pub logger: Arc<RecordingLogger>,
    /// Config the facade was opened with
    pub config: ConnectionConfig,
    _dir: Option<TempDir>,
}

/// Install a test-friendly tracing subscriber once per process
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Profile named `name` from the `DATAGATE_TEST_CONFIG` file, if any
fn profile(name: &str) -> Result<Option<ConnectionConfig>> {
    let Ok(path) = env::var("DATAGATE_TEST_CONFIG") else {
        return Ok(None);
    };
    let profiles = ConfigProfiles::load(&path)
        .with_context(|| format!("failed to load test profiles from {}", path))?;
    Ok(profiles.get(name).cloned())
}

/// Connection config for `driver`, starting its container if needed
pub fn sql_config(driver: TestDriver) -> Result<(ConnectionConfig, Option<TempDir>)> {
    if let Some(config) = profile(driver.dbtype().as_str())? {
        return Ok((config, None));
    }

    match driver {
        TestDriver::Sqlite => {
            let dir = tempfile::tempdir().context("failed to create temp directory")?;
            let path = dir.path().join("datagate-test.sq3");
            let config = ConnectionConfig::new()
                .with_param("dbtype", "sqlite3")
                .with_param("dbname", path.to_string_lossy().to_string());
            Ok((config, Some(dir)))
        }
        TestDriver::Postgres => Ok((sql_config_for("pgsql", &postgres_container()?), None)),
        TestDriver::Mysql => Ok((sql_config_for("mysql", &mysql_container()?), None)),
    }
}

/// Open a SQL facade for `driver`
pub fn test_sql(driver: TestDriver) -> Result<TestSql> {
    init_tracing();

    let (config, dir) = sql_config(driver)?;
    let logger = Arc::new(RecordingLogger::new());
    let sql = Sql::new(&config, logger.clone())
        .with_context(|| format!("failed to open {:?} connection", driver))?;

    Ok(TestSql {
        sql,
        logger,
        config,
        _dir: dir,
    })
}

/// Connection config for `driver`, starting the Redis container if needed
pub fn redis_config(driver: TestRedis) -> Result<ConnectionConfig> {
    let redistype = driver.redis_type().as_str();
    if let Some(config) = profile(redistype)? {
        return Ok(config);
    }
    Ok(redis_config_for(redistype, &redis_container()?))
}

/// Open a Redis facade for `driver`
pub fn test_redis(driver: TestRedis) -> Result<(RedisConn, Arc<RecordingLogger>)> {
    init_tracing();

    let config = redis_config(driver)?;
    let logger = Arc::new(RecordingLogger::new());
    let conn = RedisConn::new(&config, logger.clone())
        .with_context(|| format!("failed to open {:?} connection", driver))?;
    Ok((conn, logger))
}

/// Process-unique identifier, safe for table names and Redis keys
pub fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", prefix, std::process::id(), n)
}

/// Drop a table, ignoring failures
pub fn drop_table(sql: &mut Sql, table: &str) {
    if let Err(e) = sql.query_raw(&format!("DROP TABLE {}", table), &[]) {
        tracing::debug!(table, error = %e, "cleanup failed");
    }
}
