//! Backend-typed constructors
//!
//! Each wrapper forces the type discriminator (`dbtype` or `redistype`) and
//! then behaves exactly like the generic facade it derefs to.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use datagate_core::{ConnectionConfig, Logger, SqlError};

use crate::Sql;

macro_rules! typed_facade {
    ($(#[$meta:meta])* $name:ident, $facade:ty, $error:ty, $key:literal, $value:literal) => {
        $(#[$meta])*
        pub struct $name($facade);

        impl $name {
            /// Open a connection; a discriminator already in `config` is overridden
            pub fn new(config: &ConnectionConfig, logger: Arc<dyn Logger>) -> Result<Self, $error> {
                let config = config.clone().with_param($key, $value);
                <$facade>::new(&config, logger).map(Self)
            }

            pub fn into_inner(self) -> $facade {
                self.0
            }
        }

        impl Deref for $name {
            type Target = $facade;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

typed_facade!(
    /// MySQL connection
    MySql, Sql, SqlError, "dbtype", "mysql"
);
typed_facade!(
    /// PostgreSQL connection
    PgSql, Sql, SqlError, "dbtype", "pgsql"
);
typed_facade!(
    /// SQLite connection
    Sqlite3, Sql, SqlError, "dbtype", "sqlite3"
);

#[cfg(feature = "redis")]
mod redis_wrappers {
    use super::*;
    use crate::RedisConn;
    use datagate_core::RedisError;

    typed_facade!(
        /// Redis connection through the direct client
        Redis, RedisConn, RedisError, "redistype", "redis"
    );
    typed_facade!(
        /// Redis connection through the profile client
        Predis, RedisConn, RedisError, "redistype", "predis"
    );
}

#[cfg(feature = "redis")]
pub use redis_wrappers::{Predis, Redis};
