//! Redis facade
//!
//! `RedisConn` validates a config, opens one of the two client adapters and
//! forwards a fixed command set to it. Return values are the same whichever
//! adapter is behind the connection.

use std::sync::Arc;

use datagate_core::{
    ConnectionConfig, Logger, RedisError, RedisErrorKind, RedisParams, RedisType, default_logger,
};
use datagate_driver_redis::{RedisCommands, SetOptions, redis};

struct OpenRedis {
    params: RedisParams,
    client: Box<dyn RedisCommands>,
}

/// Connection to a Redis server.
///
/// Like `Sql`, construction opens the connection and `close` is terminal.
/// Native command failures surface as `EXECUTION_ERROR`.
pub struct RedisConn {
    logger: Arc<dyn Logger>,
    redistype: RedisType,
    open: Option<OpenRedis>,
}

impl RedisConn {
    /// Verify `config` and open the connection
    pub fn new(config: &ConnectionConfig, logger: Arc<dyn Logger>) -> Result<Self, RedisError> {
        logger.debug("Redis: object instantiated.");

        let params = RedisParams::from_config(config).inspect_err(|e| {
            log_rejected_config(&*logger, config, e);
        })?;

        let client = match datagate_driver_redis::connect(&params) {
            Ok(client) => client,
            Err(e) => {
                let line = format!(
                    "Redis: {} connection failed: {} <- {}",
                    params.redistype,
                    e.message(),
                    params.to_log_json()
                );
                logger.error(&line);
                return Err(RedisError::connection(line));
            }
        };

        logger.info(&format!(
            "Redis: connection opened. <- '{}'.",
            params.to_log_json()
        ));

        Ok(Self {
            logger,
            redistype: params.redistype,
            open: Some(OpenRedis { params, client }),
        })
    }

    /// Same as `new`, logging through `tracing`
    pub fn with_default_logger(config: &ConnectionConfig) -> Result<Self, RedisError> {
        Self::new(config, default_logger())
    }

    /// Set a string value.
    ///
    /// `false` means the server skipped the write, e.g. an `NX` set on an
    /// existing key. Options only reach the server on the `redis` adapter.
    pub fn set(
        &mut self,
        key: &str,
        value: &str,
        options: Option<SetOptions>,
    ) -> Result<bool, RedisError> {
        let ok = self.command("set", |client| client.set(key, value, options.as_ref()))?;
        self.logger.info(&format!(
            "Redis: set {}: {} -> '{}'.",
            tag(ok),
            key,
            value
        ));
        Ok(ok)
    }

    /// 1 when the field is new, 0 when an existing value was replaced
    pub fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<i64, RedisError> {
        let added = self.command("hset", |client| client.hset(key, field, value))?;
        self.logger.info(&format!(
            "Redis: hset ok: {}.{} -> '{}'.",
            key, field, value
        ));
        Ok(added)
    }

    /// Remove one key or several; returns how many existed.
    ///
    /// ```no_run
    /// # fn run(conn: &mut datagate_drivers::RedisConn) -> Result<(), datagate_drivers::RedisError> {
    /// conn.del("session")?;
    /// conn.del(["a", "b"])?;
    /// conn.del(vec![String::from("c")])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn del(&mut self, keys: impl RedisKeys) -> Result<u64, RedisError> {
        let keys = keys.into_keys();
        let removed = if keys.is_empty() {
            // DEL needs at least one key
            self.ensure_open()?;
            0
        } else {
            self.command("delete", |client| client.del(&keys))?
        };
        self.logger.info(&format!(
            "Redis: delete {}: '{}'.",
            tag(removed > 0),
            serde_json::Value::from(keys)
        ));
        Ok(removed)
    }

    /// Expire `key` after `seconds`; `false` if the key does not exist
    pub fn expire(&mut self, key: &str, seconds: i64) -> Result<bool, RedisError> {
        let ok = self.command("expire", |client| client.expire(key, seconds))?;
        self.logger.info(&format!(
            "Redis: expire {}: {} -> {}.",
            tag(ok),
            key,
            seconds
        ));
        Ok(ok)
    }

    /// Expire `key` at a Unix timestamp
    pub fn expireat(&mut self, key: &str, timestamp: i64) -> Result<bool, RedisError> {
        let ok = self.command("expireat", |client| client.expireat(key, timestamp))?;
        self.logger.info(&format!(
            "Redis: expireat {}: {} -> {}.",
            tag(ok),
            key,
            timestamp
        ));
        Ok(ok)
    }

    /// `None` when the key does not exist
    pub fn get(&mut self, key: &str) -> Result<Option<String>, RedisError> {
        let value = self.command("get", |client| client.get(key))?;
        self.logger.info(&format!(
            "Redis: get {}: {} -> '{}'.",
            tag(value.is_some()),
            key,
            value.as_deref().unwrap_or_default()
        ));
        Ok(value)
    }

    /// `None` when the key or the field does not exist
    pub fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, RedisError> {
        let value = self.command("hget", |client| client.hget(key, field))?;
        self.logger.info(&format!(
            "Redis: hget {}: {}.{} -> '{}'.",
            tag(value.is_some()),
            key,
            field,
            value.as_deref().unwrap_or_default()
        ));
        Ok(value)
    }

    /// Seconds left; -1 for a key without expiry, -2 for a missing key
    pub fn ttl(&mut self, key: &str) -> Result<i64, RedisError> {
        let ttl = self.command("ttl", |client| client.ttl(key))?;
        // -2 is the only reply for a missing key
        self.logger
            .info(&format!("Redis: ttl {}: {} -> {}.", tag(ttl != -2), key, ttl));
        Ok(ttl)
    }

    /// Server time as a Unix timestamp, optionally with microseconds
    pub fn time(&mut self, with_microseconds: bool) -> Result<f64, RedisError> {
        let (secs, micros) = self.command("time", |client| client.time())?;
        self.logger
            .info(&format!("Redis: time ok: {}.{:06}.", secs, micros));
        if with_microseconds {
            Ok(secs as f64 + micros as f64 / 1e6)
        } else {
            Ok(secs as f64)
        }
    }

    /// The native connection, for commands outside the facade
    pub fn get_connection(&mut self) -> Result<&mut redis::Connection, RedisError> {
        let open = self.ensure_open()?;
        Ok(open.client.connection())
    }

    pub fn get_connection_params(&self) -> Result<&RedisParams, RedisError> {
        self.open
            .as_ref()
            .map(|open| &open.params)
            .ok_or_else(|| closed(&*self.logger, self.redistype))
    }

    /// Params with the password replaced by a placeholder
    pub fn get_safe_params(&self) -> Result<RedisParams, RedisError> {
        self.get_connection_params().map(RedisParams::redacted)
    }

    /// Client shape of this instance; still available after `close`
    pub fn redis_type(&self) -> RedisType {
        self.redistype
    }

    pub fn is_closed(&self) -> bool {
        self.open.is_none()
    }

    /// Drop the connection. Closing twice is an error.
    pub fn close(&mut self) -> Result<(), RedisError> {
        let Some(open) = self.open.take() else {
            return Err(closed(&*self.logger, self.redistype));
        };
        open.client.close();
        self.logger.debug("Redis: connection closed.");
        Ok(())
    }

    fn ensure_open(&mut self) -> Result<&mut OpenRedis, RedisError> {
        let Self {
            logger,
            redistype,
            open,
        } = self;
        open.as_mut().ok_or_else(|| closed(&**logger, *redistype))
    }

    /// Run one adapter call, lifting native failures into `EXECUTION_ERROR`
    fn command<T>(
        &mut self,
        name: &str,
        call: impl FnOnce(&mut dyn RedisCommands) -> redis::RedisResult<T>,
    ) -> Result<T, RedisError> {
        let open = self.ensure_open()?;
        let result = call(open.client.as_mut());
        result.map_err(|e| {
            tracing::debug!(command = name, kind = ?e.kind(), "redis command failed");
            let line = format!("Redis: {} fail: {}.", name, e);
            self.logger.error(&line);
            RedisError::execution(line)
        })
    }
}

/// Keys accepted by `RedisConn::del`: a single key or any sequence of keys
pub trait RedisKeys {
    fn into_keys(self) -> Vec<String>;
}

impl RedisKeys for &str {
    fn into_keys(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl RedisKeys for String {
    fn into_keys(self) -> Vec<String> {
        vec![self]
    }
}

impl RedisKeys for &String {
    fn into_keys(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<K: AsRef<str>> RedisKeys for Vec<K> {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|k| k.as_ref().to_string()).collect()
    }
}

impl<K: AsRef<str>> RedisKeys for &Vec<K> {
    fn into_keys(self) -> Vec<String> {
        self.as_slice().into_keys()
    }
}

impl<K: AsRef<str>> RedisKeys for &[K] {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|k| k.as_ref().to_string()).collect()
    }
}

impl<K: AsRef<str>, const N: usize> RedisKeys for [K; N] {
    fn into_keys(self) -> Vec<String> {
        self.iter().map(|k| k.as_ref().to_string()).collect()
    }
}

impl<K: AsRef<str>, const N: usize> RedisKeys for &[K; N] {
    fn into_keys(self) -> Vec<String> {
        self.as_slice().into_keys()
    }
}

fn tag(ok: bool) -> &'static str {
    if ok { "ok" } else { "fail" }
}

fn closed(logger: &dyn Logger, redistype: RedisType) -> RedisError {
    let line = format!("Redis: {} connection is closed.", redistype);
    logger.error(&line);
    RedisError::connection(line)
}

fn log_rejected_config(logger: &dyn Logger, config: &ConnectionConfig, err: &RedisError) {
    match err.kind() {
        RedisErrorKind::RedisType => logger.error(&format!(
            "Redis: redis library not supported: '{}'.",
            config.get_non_empty("redistype").unwrap_or_default()
        )),
        _ => {
            let key = if config.get_non_empty("redistype").is_none() {
                "redistype"
            } else {
                "redishost"
            };
            logger.error(&format!("Redis: param not supplied: '{}'.", key));
        }
    }
}
