//! Connection configuration
//!
//! A `ConnectionConfig` is the raw, string-keyed map handed to a facade.
//! Facades verify it into `SqlParams` or `RedisParams`, which are kept for
//! the lifetime of the connection and redacted before they are ever logged.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::{ConfigError, DriverError, DriverResult, RedisError, SqlError};

/// Placeholder written over secrets in logged parameter dumps
pub const REDACTED: &str = "XxXxXxXxXx";

/// Default Redis port
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Raw connection configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionConfig {
    /// Connection parameters, scalars stored as text
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Set a connection parameter in place; `null` removes the key
    pub fn set_param(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        let str_val = match value.into() {
            serde_json::Value::Null => {
                self.params.remove(key);
                return;
            }
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.params.insert(key.to_string(), str_val);
    }

    /// Drop a parameter
    pub fn without_param(mut self, key: &str) -> Self {
        self.params.remove(key);
        self
    }

    /// Get a string parameter
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.params.get(key).cloned()
    }

    /// Get a parameter, treating the empty string as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Build from a JSON object of scalars
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let object = value.as_object().ok_or_else(|| ConfigError::InvalidValue {
            key: "<root>".into(),
            reason: "expected an object".into(),
        })?;

        let mut config = Self::new();
        for (key, val) in object {
            match val {
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: key.clone(),
                        reason: "expected a scalar".into(),
                    });
                }
                scalar => config.set_param(key, scalar.clone()),
            }
        }
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json_value(&value)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = text.parse()?;
        Self::from_toml_table(&table)
    }

    fn from_toml_table(table: &toml::Table) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for (key, val) in table {
            let text = match val {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.clone(),
                        reason: "expected a scalar".into(),
                    });
                }
            };
            config.params.insert(key.clone(), text);
        }
        Ok(config)
    }
}

/// Named connection profiles, e.g. one per backend under test.
///
/// JSON: `{"sqlite3": {"dbtype": "sqlite3", "dbname": "app.sq3"}}`
/// TOML: `[sqlite3]` tables with the same keys.
#[derive(Debug, Clone, Default)]
pub struct ConfigProfiles {
    profiles: BTreeMap<String, ConnectionConfig>,
}

impl ConfigProfiles {
    /// Load profiles from a `.json` or `.toml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let profiles = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("toml") => Self::from_toml_str(&text)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        tracing::debug!(path = %path.display(), count = profiles.len(), "connection profiles loaded");
        Ok(profiles)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        let object = root.as_object().ok_or_else(|| ConfigError::InvalidValue {
            key: "<root>".into(),
            reason: "expected an object of profiles".into(),
        })?;

        let mut profiles = BTreeMap::new();
        for (name, value) in object {
            profiles.insert(name.clone(), ConnectionConfig::from_json_value(value)?);
        }
        Ok(Self { profiles })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let root: toml::Table = text.parse()?;
        let mut profiles = BTreeMap::new();
        for (name, value) in &root {
            let table = value.as_table().ok_or_else(|| ConfigError::InvalidValue {
                key: name.clone(),
                reason: "expected a table".into(),
            })?;
            profiles.insert(name.clone(), ConnectionConfig::from_toml_table(table)?);
        }
        Ok(Self { profiles })
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionConfig> {
        self.profiles.get(name)
    }

    pub fn profile(&self, name: &str) -> Result<&ConnectionConfig, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::MissingProfile(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Supported relational backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DbType {
    #[serde(rename = "sqlite3")]
    Sqlite3,
    #[serde(rename = "mysql")]
    Mysql,
    #[serde(rename = "pgsql")]
    Pgsql,
}

impl DbType {
    /// Parse a `dbtype` value; `postgresql` is an alias for `pgsql`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sqlite3" => Some(DbType::Sqlite3),
            "mysql" => Some(DbType::Mysql),
            "pgsql" | "postgresql" => Some(DbType::Pgsql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Sqlite3 => "sqlite3",
            DbType::Mysql => "mysql",
            DbType::Pgsql => "pgsql",
        }
    }

    /// Whether the backend authenticates a named user
    pub fn requires_user(&self) -> bool {
        !matches!(self, DbType::Sqlite3)
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified SQL connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlParams {
    pub dbtype: DbType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbhost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbuser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbpass: Option<String>,
    pub dbname: String,
}

impl SqlParams {
    /// Keys copied from a `ConnectionConfig`; anything else is ignored
    pub const KEYS: [&'static str; 6] = ["dbtype", "dbhost", "dbport", "dbuser", "dbpass", "dbname"];

    /// Verify a raw config.
    ///
    /// Checks run in a fixed order: mandatory `dbtype`/`dbname`, then the
    /// type itself, then `dbuser` for server backends.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, SqlError> {
        let dbtype = config
            .get_non_empty("dbtype")
            .ok_or_else(|| SqlError::connection_args("'dbtype' not supplied."))?;
        let dbname = config
            .get_non_empty("dbname")
            .ok_or_else(|| SqlError::connection_args("'dbname' not supplied."))?;
        let dbtype = DbType::from_name(dbtype)
            .ok_or_else(|| SqlError::dbtype(format!("'{}' not supported.", dbtype)))?;

        let dbuser = config.get_string("dbuser");
        if dbtype.requires_user() && dbuser.as_deref().is_none_or(str::is_empty) {
            return Err(SqlError::connection_args("'dbuser' not supplied."));
        }

        Ok(Self {
            dbtype,
            dbhost: config.get_string("dbhost"),
            dbport: config.get_string("dbport"),
            dbuser,
            dbpass: config.get_string("dbpass"),
            dbname: dbname.to_string(),
        })
    }

    pub fn host(&self) -> Option<&str> {
        self.dbhost.as_deref().filter(|v| !v.is_empty())
    }

    pub fn port(&self) -> Option<&str> {
        self.dbport.as_deref().filter(|v| !v.is_empty())
    }

    pub fn user(&self) -> Option<&str> {
        self.dbuser.as_deref().filter(|v| !v.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.dbpass.as_deref().filter(|v| !v.is_empty())
    }

    /// Numeric port, if one was configured
    pub fn port_number(&self) -> DriverResult<Option<u16>> {
        self.port()
            .map(|p| {
                p.parse::<u16>()
                    .map_err(|e| DriverError::new(format!("Invalid port '{}': {}", p, e)))
            })
            .transpose()
    }

    /// Copy with the password replaced by the placeholder
    pub fn redacted(&self) -> Self {
        let mut safe = self.clone();
        if safe.dbpass.is_some() {
            safe.dbpass = Some(REDACTED.to_string());
        }
        safe
    }

    /// Redacted params rendered for a log line
    pub fn to_log_json(&self) -> String {
        serde_json::to_string(&self.redacted()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Supported Redis client shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedisType {
    /// Explicit connect, then AUTH/SELECT/PING
    Redis,
    /// Structured connection profile
    Predis,
}

impl RedisType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "redis" => Some(RedisType::Redis),
            "predis" => Some(RedisType::Predis),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RedisType::Redis => "redis",
            RedisType::Predis => "predis",
        }
    }
}

impl fmt::Display for RedisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified Redis connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedisParams {
    pub redistype: RedisType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redisscheme: Option<String>,
    pub redishost: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redisport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redispassword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redisdatabase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redistimeout: Option<String>,
}

impl RedisParams {
    pub const KEYS: [&'static str; 7] = [
        "redistype",
        "redisscheme",
        "redishost",
        "redisport",
        "redispassword",
        "redisdatabase",
        "redistimeout",
    ];

    /// Verify a raw config: mandatory keys first, then the client type
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, RedisError> {
        let redistype = config
            .get_non_empty("redistype")
            .ok_or_else(|| RedisError::connection_args("'redistype' not supplied."))?;
        let redishost = config
            .get_non_empty("redishost")
            .ok_or_else(|| RedisError::connection_args("'redishost' not supplied."))?;
        let redistype = RedisType::from_name(redistype)
            .ok_or_else(|| RedisError::redis_type(format!("{} not supported.", redistype)))?;

        Ok(Self {
            redistype,
            redisscheme: config.get_string("redisscheme"),
            redishost: redishost.to_string(),
            redisport: config.get_string("redisport"),
            redispassword: config.get_string("redispassword"),
            redisdatabase: config.get_string("redisdatabase"),
            redistimeout: config.get_string("redistimeout"),
        })
    }

    pub fn scheme(&self) -> &str {
        self.redisscheme
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or("tcp")
    }

    pub fn password(&self) -> Option<&str> {
        self.redispassword.as_deref().filter(|v| !v.is_empty())
    }

    pub fn port(&self) -> DriverResult<u16> {
        match self.redisport.as_deref().filter(|v| !v.is_empty()) {
            None => Ok(DEFAULT_REDIS_PORT),
            Some(p) => p
                .parse::<u16>()
                .map_err(|e| DriverError::new(format!("Invalid port '{}': {}", p, e))),
        }
    }

    /// Database index; `0` and absent both mean the default database
    pub fn database(&self) -> DriverResult<Option<i64>> {
        match self.redisdatabase.as_deref().filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(db) => db
                .parse::<i64>()
                .map(|n| (n != 0).then_some(n))
                .map_err(|e| DriverError::new(format!("Invalid database '{}': {}", db, e))),
        }
    }

    /// Connect timeout in seconds, fractional values allowed
    pub fn timeout(&self) -> DriverResult<Option<Duration>> {
        match self.redistimeout.as_deref().filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(t) => {
                let secs = t
                    .parse::<f64>()
                    .map_err(|e| DriverError::new(format!("Invalid timeout '{}': {}", t, e)))?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(DriverError::new(format!("Invalid timeout '{}'", t)));
                }
                Ok(Some(Duration::from_secs_f64(secs)))
            }
        }
    }

    pub fn redacted(&self) -> Self {
        let mut safe = self.clone();
        if safe.redispassword.is_some() {
            safe.redispassword = Some(REDACTED.to_string());
        }
        safe
    }

    pub fn to_log_json(&self) -> String {
        serde_json::to_string(&self.redacted()).unwrap_or_else(|_| "{}".to_string())
    }
}
