//! Docker container management for integration tests.
//!
//! Containers are started lazily with the blocking testcontainers runner the
//! first time a test asks for one, then cached for the rest of the test
//! process. The facades under test are blocking and run their own Tokio
//! runtimes, so nothing here is async.
//!
//! ```rust,ignore
//! use crate::test_containers::postgres_container;
//!
//! let info = postgres_container()?;
//! // Build a ConnectionConfig from info.host / info.port...
//! ```

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use datagate_core::{ConnectionConfig, RecordingLogger};
use datagate_drivers::Sql;
use once_cell::sync::Lazy;
use testcontainers::{Container, Image, runners::SyncRunner};
use testcontainers_modules::{mysql::Mysql, postgres::Postgres, redis::Redis};

/// Connect attempts made while a freshly started server warms up
const READY_ATTEMPTS: u32 = 15;

/// Information about a running test container
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Host address (typically 127.0.0.1)
    pub host: String,
    /// Port number (randomly assigned by testcontainers)
    pub port: u16,
    /// Database name
    pub database: Option<String>,
    /// Username for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
}

struct Running<I: Image> {
    #[allow(dead_code)]
    inner: Container<I>,
    info: ContainerInfo,
}

static POSTGRES_CONTAINER: Lazy<Mutex<Option<Running<Postgres>>>> = Lazy::new(|| Mutex::new(None));

static MYSQL_CONTAINER: Lazy<Mutex<Option<Running<Mysql>>>> = Lazy::new(|| Mutex::new(None));

static REDIS_CONTAINER: Lazy<Mutex<Option<Running<Redis>>>> = Lazy::new(|| Mutex::new(None));

/// Start `image` once per process and return its connection info
fn cached<I: Image>(
    slot: &Mutex<Option<Running<I>>>,
    name: &str,
    image: impl FnOnce() -> I,
    internal_port: u16,
    describe: impl FnOnce(u16) -> ContainerInfo,
) -> Result<ContainerInfo> {
    let mut guard = slot
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock {} container: {}", name, e))?;

    if let Some(running) = &*guard {
        return Ok(running.info.clone());
    }

    tracing::info!("starting {} test container", name);

    let container = image()
        .start()
        .with_context(|| format!("failed to start {} container", name))?;
    let host_port = container
        .get_host_port_ipv4(internal_port)
        .with_context(|| format!("failed to get {} port", name))?;

    let info = describe(host_port);
    tracing::info!(port = host_port, "{} test container started", name);

    *guard = Some(Running {
        inner: container,
        info: info.clone(),
    });
    Ok(info)
}

/// Block until the server accepts a facade connection
fn wait_until_ready(config: &ConnectionConfig, name: &str) -> Result<()> {
    for attempt in 1..=READY_ATTEMPTS {
        match Sql::new(config, Arc::new(RecordingLogger::new())) {
            Ok(mut sql) => {
                sql.close().ok();
                return Ok(());
            }
            Err(e) if attempt < READY_ATTEMPTS => {
                tracing::warn!(attempt, "{} not ready yet: {}", name, e);
                thread::sleep(Duration::from_secs(1));
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "{} not ready after {} attempts: {}",
                    name,
                    READY_ATTEMPTS,
                    e
                ));
            }
        }
    }
    Ok(())
}

/// Get or create the PostgreSQL test container
pub fn postgres_container() -> Result<ContainerInfo> {
    let info = cached(&POSTGRES_CONTAINER, "PostgreSQL", Postgres::default, 5432, |port| {
        // testcontainers-modules Postgres defaults
        ContainerInfo {
            host: "127.0.0.1".to_string(),
            port,
            database: Some("postgres".to_string()),
            username: Some("postgres".to_string()),
            password: Some("postgres".to_string()),
        }
    })?;
    wait_until_ready(&sql_config_for("pgsql", &info), "PostgreSQL")?;
    Ok(info)
}

/// Get or create the MySQL test container
pub fn mysql_container() -> Result<ContainerInfo> {
    let info = cached(&MYSQL_CONTAINER, "MySQL", Mysql::default, 3306, |port| {
        // testcontainers-modules MySQL defaults: root without a password
        ContainerInfo {
            host: "127.0.0.1".to_string(),
            port,
            database: Some("test".to_string()),
            username: Some("root".to_string()),
            password: None,
        }
    })?;
    wait_until_ready(&sql_config_for("mysql", &info), "MySQL")?;
    Ok(info)
}

/// Get or create the Redis test container
pub fn redis_container() -> Result<ContainerInfo> {
    cached(&REDIS_CONTAINER, "Redis", Redis::default, 6379, |port| ContainerInfo {
        host: "127.0.0.1".to_string(),
        port,
        database: None,
        username: None,
        password: None,
    })
}

/// SQL connection config pointing at a container
pub fn sql_config_for(dbtype: &str, info: &ContainerInfo) -> ConnectionConfig {
    ConnectionConfig::new()
        .with_param("dbtype", dbtype)
        .with_param("dbhost", info.host.as_str())
        .with_param("dbport", info.port)
        .with_param("dbname", info.database.clone().unwrap_or_default())
        .with_param("dbuser", info.username.clone().unwrap_or_default())
        .with_param("dbpass", info.password.clone().unwrap_or_default())
}

/// Redis connection config pointing at a container
pub fn redis_config_for(redistype: &str, info: &ContainerInfo) -> ConnectionConfig {
    ConnectionConfig::new()
        .with_param("redistype", redistype)
        .with_param("redishost", info.host.as_str())
        .with_param("redisport", info.port)
        .with_param("redisdatabase", 10)
}
