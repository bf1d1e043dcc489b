//! Profile client: the whole connection (scheme, address, database,
//! password, timeout) is described up front and the client authenticates
//! and selects the database while connecting.

use std::time::Duration;

use datagate_core::{DriverError, DriverResult, RedisParams, RedisType};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisResult, Value};

use crate::{RedisCommands, SetOptions};

/// Connect timeout when `redistimeout` is not configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Adapter for `redistype = "predis"`
pub struct ProfileClient {
    connection: redis::Connection,
}

/// Translate verified params into a connection profile
pub fn connection_profile(params: &RedisParams) -> DriverResult<ConnectionInfo> {
    let addr = match params.scheme() {
        "tcp" => ConnectionAddr::Tcp(params.redishost.clone(), params.port()?),
        #[cfg(unix)]
        "unix" => ConnectionAddr::Unix(params.redishost.clone().into()),
        other => {
            return Err(DriverError::new(format!(
                "Unsupported Redis scheme '{}'",
                other
            )));
        }
    };

    Ok(ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            db: params.database()?.unwrap_or(0),
            password: params.password().map(str::to_string),
            ..Default::default()
        },
    })
}

impl ProfileClient {
    pub fn connect(params: &RedisParams) -> DriverResult<Self> {
        let info = connection_profile(params)?;
        let timeout = params.timeout()?.unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        tracing::debug!(addr = %info.addr, db = info.redis.db, ?timeout, "connecting to Redis");

        let client = redis::Client::open(info)
            .map_err(|e| DriverError::new(format!("Failed to create Redis client: {}", e)))?;
        let mut connection = client
            .get_connection_with_timeout(timeout)
            .map_err(|e| DriverError::new(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query::<()>(&mut connection)
            .map_err(|e| DriverError::new(format!("Redis connection verification failed: {}", e)))?;

        tracing::debug!("Redis connection verified with PING");
        Ok(Self { connection })
    }

    fn run(&mut self, cmd: &redis::Cmd) -> RedisResult<Value> {
        cmd.query(&mut self.connection)
    }
}

/// Nil replies become `None`; everything else must read as a string
pub(crate) fn normalize_string(value: Value) -> RedisResult<Option<String>> {
    match value {
        Value::Nil => Ok(None),
        other => redis::from_redis_value(&other).map(Some),
    }
}

impl RedisCommands for ProfileClient {
    fn driver(&self) -> RedisType {
        RedisType::Predis
    }

    /// Options are not forwarded by this client shape
    fn set(&mut self, key: &str, value: &str, options: Option<&SetOptions>) -> RedisResult<bool> {
        if options.is_some() {
            tracing::debug!("set options ignored by the predis client");
        }
        let reply = self.run(redis::cmd("SET").arg(key).arg(value))?;
        Ok(!matches!(reply, Value::Nil))
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> RedisResult<i64> {
        let reply = self.run(redis::cmd("HSET").arg(key).arg(field).arg(value))?;
        redis::from_redis_value(&reply)
    }

    fn del(&mut self, keys: &[String]) -> RedisResult<u64> {
        let reply = self.run(redis::cmd("DEL").arg(keys.to_vec()))?;
        redis::from_redis_value(&reply)
    }

    fn expire(&mut self, key: &str, seconds: i64) -> RedisResult<bool> {
        let reply = self.run(redis::cmd("EXPIRE").arg(key).arg(seconds))?;
        redis::from_redis_value(&reply)
    }

    fn expireat(&mut self, key: &str, timestamp: i64) -> RedisResult<bool> {
        let reply = self.run(redis::cmd("EXPIREAT").arg(key).arg(timestamp))?;
        redis::from_redis_value(&reply)
    }

    fn get(&mut self, key: &str) -> RedisResult<Option<String>> {
        let reply = self.run(redis::cmd("GET").arg(key))?;
        normalize_string(reply)
    }

    fn hget(&mut self, key: &str, field: &str) -> RedisResult<Option<String>> {
        let reply = self.run(redis::cmd("HGET").arg(key).arg(field))?;
        normalize_string(reply)
    }

    fn ttl(&mut self, key: &str) -> RedisResult<i64> {
        let reply = self.run(redis::cmd("TTL").arg(key))?;
        redis::from_redis_value(&reply)
    }

    fn time(&mut self) -> RedisResult<(i64, i64)> {
        let reply = self.run(&redis::cmd("TIME"))?;
        redis::from_redis_value(&reply)
    }

    fn connection(&mut self) -> &mut redis::Connection {
        &mut self.connection
    }

    fn close(self: Box<Self>) {
        tracing::debug!("closing Redis connection");
        drop(self);
    }
}
