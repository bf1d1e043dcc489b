//! Redis client adapters
//!
//! Two client shapes sit behind the `RedisCommands` trait:
//!
//! - `DirectClient` (`redistype = "redis"`) connects with a short timeout and
//!   then issues AUTH, SELECT and PING itself
//! - `ProfileClient` (`redistype = "predis"`) describes the whole connection
//!   up front and lets the client authenticate and select during connect

mod commands;
#[cfg(test)]
mod commands_tests;
mod direct;
mod profile;
#[cfg(test)]
mod profile_tests;

pub use commands::{RedisCommands, SetCondition, SetExpiry, SetOptions};
pub use direct::DirectClient;
pub use profile::ProfileClient;
pub use redis;

use datagate_core::{DriverResult, RedisParams, RedisType};

/// Open the adapter matching `params.redistype`
#[tracing::instrument(skip(params), fields(redistype = %params.redistype, host = %params.redishost))]
pub fn connect(params: &RedisParams) -> DriverResult<Box<dyn RedisCommands>> {
    match params.redistype {
        RedisType::Redis => Ok(Box::new(DirectClient::connect(params)?)),
        RedisType::Predis => Ok(Box::new(ProfileClient::connect(params)?)),
    }
}
