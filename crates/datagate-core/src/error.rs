//! Error types for Datagate
//!
//! The public taxonomy is split in two families, one per facade. Each kind
//! carries a stable numeric code so callers can match on it across versions.

use std::fmt;
use thiserror::Error;

use crate::Value;

/// Failure kinds raised by the SQL facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SqlErrorKind {
    /// Unsupported `dbtype`
    DbType = 0x10,
    /// Missing mandatory configuration key
    ConnectionArgs = 0x20,
    /// Native connect failure, or use of a closed connection
    Connection = 0x30,
    /// Prepare, bind or execute failure
    Execution = 0x40,
}

impl SqlErrorKind {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            SqlErrorKind::DbType => "DBTYPE_ERROR",
            SqlErrorKind::ConnectionArgs => "CONNECTION_ARGS_ERROR",
            SqlErrorKind::Connection => "CONNECTION_ERROR",
            SqlErrorKind::Execution => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for SqlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error raised by the SQL facade.
///
/// Execution failures keep the statement text and the bound arguments so
/// the failing call can be reproduced from the error alone.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct SqlError {
    kind: SqlErrorKind,
    message: String,
    statement: Option<String>,
    args: Vec<Value>,
}

impl SqlError {
    pub fn new(kind: SqlErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            statement: None,
            args: Vec::new(),
        }
    }

    pub fn dbtype(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::DbType, message)
    }

    pub fn connection_args(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::ConnectionArgs, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(SqlErrorKind::Connection, message)
    }

    /// Execution failure with the offending statement and its arguments
    pub fn execution(message: impl Into<String>, statement: &str, args: &[Value]) -> Self {
        Self {
            kind: SqlErrorKind::Execution,
            message: message.into(),
            statement: Some(statement.to_string()),
            args: args.to_vec(),
        }
    }

    pub fn kind(&self) -> SqlErrorKind {
        self.kind
    }

    /// Stable numeric discriminant of the kind
    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// Failure kinds raised by the Redis facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RedisErrorKind {
    /// Unsupported `redistype`
    RedisType = 0x10,
    /// Missing mandatory configuration key
    ConnectionArgs = 0x20,
    /// Native connect, auth, select or ping failure, or use of a closed connection
    Connection = 0x30,
    /// A command was rejected by the server or the link dropped mid-command
    Execution = 0x40,
}

impl RedisErrorKind {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            RedisErrorKind::RedisType => "REDISTYPE_ERROR",
            RedisErrorKind::ConnectionArgs => "CONNECTION_ARGS_ERROR",
            RedisErrorKind::Connection => "CONNECTION_ERROR",
            RedisErrorKind::Execution => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for RedisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error raised by the Redis facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RedisError {
    kind: RedisErrorKind,
    message: String,
}

impl RedisError {
    pub fn new(kind: RedisErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn redis_type(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::RedisType, message)
    }

    pub fn connection_args(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::ConnectionArgs, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::Connection, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::Execution, message)
    }

    pub fn kind(&self) -> RedisErrorKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error reported by a backend driver crate.
///
/// Drivers never decide the public error kind; the facades lift this into
/// `SqlError` or `RedisError` depending on where the failure happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DriverError(String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Result type alias for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Error raised while loading connection profiles
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Profile not found: {0}")]
    MissingProfile(String),
}
