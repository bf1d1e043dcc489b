//! Direct client: plain TCP connect, then explicit AUTH, SELECT and PING

use std::time::Duration;

use datagate_core::{DriverError, DriverResult, RedisParams, RedisType};
use redis::{Commands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisResult};

use crate::{RedisCommands, SetOptions};

/// Connect timeout when `redistimeout` is not configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// Adapter for `redistype = "redis"`
pub struct DirectClient {
    connection: redis::Connection,
}

impl DirectClient {
    pub fn connect(params: &RedisParams) -> DriverResult<Self> {
        let port = params.port()?;
        let database = params.database()?;
        let timeout = params.timeout()?.unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        tracing::debug!(host = %params.redishost, port, ?timeout, "connecting to Redis");

        // Credentials and database are sent by hand below, not by the client
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(params.redishost.clone(), port),
            redis: RedisConnectionInfo::default(),
        };
        let client = redis::Client::open(info)
            .map_err(|e| DriverError::new(format!("Failed to create Redis client: {}", e)))?;
        let mut connection = client
            .get_connection_with_timeout(timeout)
            .map_err(|e| DriverError::new(format!("Failed to connect to Redis: {}", e)))?;

        if let Some(password) = params.password() {
            redis::cmd("AUTH")
                .arg(password)
                .query::<()>(&mut connection)
                .map_err(|e| DriverError::new(format!("Redis AUTH failed: {}", e)))?;
        }

        if let Some(db) = database {
            redis::cmd("SELECT")
                .arg(db)
                .query::<()>(&mut connection)
                .map_err(|e| DriverError::new(format!("Redis SELECT {} failed: {}", db, e)))?;
        }

        // Verify connection actually works by sending PING
        let pong: String = redis::cmd("PING")
            .query(&mut connection)
            .map_err(|e| DriverError::new(format!("Redis connection verification failed: {}", e)))?;
        if pong != "PONG" {
            tracing::warn!("Unexpected PING response: {}", pong);
        }

        tracing::debug!("Redis connection verified with PING");
        Ok(Self { connection })
    }
}

impl RedisCommands for DirectClient {
    fn driver(&self) -> RedisType {
        RedisType::Redis
    }

    fn set(&mut self, key: &str, value: &str, options: Option<&SetOptions>) -> RedisResult<bool> {
        let reply: Option<String> = match options {
            None => self.connection.set(key, value)?,
            Some(SetOptions::Ttl(secs)) => redis::cmd("SETEX")
                .arg(key)
                .arg(*secs)
                .arg(value)
                .query(&mut self.connection)?,
            Some(extended) => redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg(extended.set_args())
                .query(&mut self.connection)?,
        };
        // NX/XX report a skipped write as nil
        Ok(reply.is_some())
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> RedisResult<i64> {
        self.connection.hset(key, field, value)
    }

    fn del(&mut self, keys: &[String]) -> RedisResult<u64> {
        self.connection.del(keys.to_vec())
    }

    fn expire(&mut self, key: &str, seconds: i64) -> RedisResult<bool> {
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query(&mut self.connection)
    }

    fn expireat(&mut self, key: &str, timestamp: i64) -> RedisResult<bool> {
        redis::cmd("EXPIREAT")
            .arg(key)
            .arg(timestamp)
            .query(&mut self.connection)
    }

    fn get(&mut self, key: &str) -> RedisResult<Option<String>> {
        self.connection.get(key)
    }

    fn hget(&mut self, key: &str, field: &str) -> RedisResult<Option<String>> {
        self.connection.hget(key, field)
    }

    fn ttl(&mut self, key: &str) -> RedisResult<i64> {
        self.connection.ttl(key)
    }

    fn time(&mut self) -> RedisResult<(i64, i64)> {
        redis::cmd("TIME").query(&mut self.connection)
    }

    fn connection(&mut self) -> &mut redis::Connection {
        &mut self.connection
    }

    fn close(self: Box<Self>) {
        tracing::debug!("closing Redis connection");
        drop(self);
    }
}
