//! Datagate Drivers - one data-access API over several backends
//!
//! `Sql` covers the relational backends (sqlite3, mysql, pgsql) and
//! `RedisConn` covers the two Redis client shapes (redis, predis). Each
//! backend lives in its own crate and is compiled in through a cargo
//! feature of the same name.

// SQL Databases
#[cfg(feature = "mysql")]
pub use datagate_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use datagate_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use datagate_driver_sqlite as sqlite;

// Key-value stores
#[cfg(feature = "redis")]
pub use datagate_driver_redis as redis;

#[cfg(feature = "redis")]
mod redis_conn;
mod registry;
mod sql;
#[cfg(test)]
mod sql_tests;
mod wrappers;

#[cfg(feature = "redis")]
pub use redis_conn::{RedisConn, RedisKeys};
pub use registry::DriverRegistry;
pub use sql::Sql;
#[cfg(feature = "redis")]
pub use wrappers::{Predis, Redis};
pub use wrappers::{MySql, PgSql, Sqlite3};

#[cfg(feature = "redis")]
pub use datagate_driver_redis::{SetCondition, SetExpiry, SetOptions};

/// Re-export commonly used types from datagate-core
pub use datagate_core::{
    ConfigProfiles, ConnectionConfig, DbType, Fragment, Inserted, LogLevel, Logger,
    NativeConnection, QueryResult, RecordingLogger, RedisError, RedisErrorKind, RedisParams,
    RedisType, Row, SqlError, SqlErrorKind, SqlParams, TracingLogger, Value, default_logger,
};
