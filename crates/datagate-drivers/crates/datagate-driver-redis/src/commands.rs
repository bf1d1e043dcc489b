//! The command subset shared by both Redis adapters

use datagate_core::RedisType;
use redis::RedisResult;

/// `SET` precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Only set if the key does not exist
    Nx,
    /// Only set if the key already exists
    Xx,
}

/// `SET` expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetExpiry {
    /// Seconds
    Ex(u64),
    /// Milliseconds
    Px(u64),
}

/// Options for `set`; only the direct adapter honours them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOptions {
    /// Plain expiry in seconds, sent as `SETEX`
    Ttl(u64),
    /// `SET key value [NX|XX] [EX s|PX ms]`
    Extended {
        condition: Option<SetCondition>,
        expiry: Option<SetExpiry>,
    },
}

impl SetOptions {
    pub fn nx() -> Self {
        SetOptions::Extended {
            condition: Some(SetCondition::Nx),
            expiry: None,
        }
    }

    pub fn xx() -> Self {
        SetOptions::Extended {
            condition: Some(SetCondition::Xx),
            expiry: None,
        }
    }

    /// Add an expiry to an extended option set; a `Ttl` is replaced
    pub fn with_expiry(self, expiry: SetExpiry) -> Self {
        match self {
            SetOptions::Ttl(_) => SetOptions::Extended {
                condition: None,
                expiry: Some(expiry),
            },
            SetOptions::Extended { condition, .. } => SetOptions::Extended {
                condition,
                expiry: Some(expiry),
            },
        }
    }

    /// Trailing `SET` arguments, e.g. `["NX", "EX", "10"]`
    pub fn set_args(&self) -> Vec<String> {
        match self {
            SetOptions::Ttl(secs) => vec!["EX".to_string(), secs.to_string()],
            SetOptions::Extended { condition, expiry } => {
                let mut args = Vec::new();
                match condition {
                    Some(SetCondition::Nx) => args.push("NX".to_string()),
                    Some(SetCondition::Xx) => args.push("XX".to_string()),
                    None => {}
                }
                match expiry {
                    Some(SetExpiry::Ex(secs)) => {
                        args.push("EX".to_string());
                        args.push(secs.to_string());
                    }
                    Some(SetExpiry::Px(ms)) => {
                        args.push("PX".to_string());
                        args.push(ms.to_string());
                    }
                    None => {}
                }
                args
            }
        }
    }
}

/// Uniform command set over a native Redis connection.
///
/// Return values are already normalized: a missing key or field is `None`
/// on both adapters.
pub trait RedisCommands: Send {
    /// The client shape behind this adapter
    fn driver(&self) -> RedisType;

    fn set(&mut self, key: &str, value: &str, options: Option<&SetOptions>) -> RedisResult<bool>;

    /// 1 when the field is new, 0 when it was overwritten
    fn hset(&mut self, key: &str, field: &str, value: &str) -> RedisResult<i64>;

    /// Number of keys removed
    fn del(&mut self, keys: &[String]) -> RedisResult<u64>;

    fn expire(&mut self, key: &str, seconds: i64) -> RedisResult<bool>;

    fn expireat(&mut self, key: &str, timestamp: i64) -> RedisResult<bool>;

    fn get(&mut self, key: &str) -> RedisResult<Option<String>>;

    fn hget(&mut self, key: &str, field: &str) -> RedisResult<Option<String>>;

    /// Remaining time to live; -1 without expiry, -2 for a missing key
    fn ttl(&mut self, key: &str) -> RedisResult<i64>;

    /// Server `TIME` as (seconds, microseconds)
    fn time(&mut self) -> RedisResult<(i64, i64)>;

    /// The native connection, for commands outside this subset
    fn connection(&mut self) -> &mut redis::Connection;

    fn close(self: Box<Self>);
}
