//! Datagate Core - shared abstractions for the data-access layer
//!
//! This crate provides the types every other Datagate crate depends on:
//!
//! - `SqlError` / `RedisError` - the public error taxonomy with stable numeric kinds
//! - `ConnectionConfig` - the string-keyed configuration map, plus file profiles
//! - `SqlParams` / `RedisParams` - verified connection parameters and their redacted copies
//! - `SqlDriver` / `NativeConnection` - the per-backend strategy seam
//! - `Logger` - the injected logging collaborator
//! - Common types like `Value`, `Row` and `QueryResult`

mod config;
mod driver;
#[cfg(test)]
mod driver_tests;
mod error;
mod logger;
pub mod runtime;
mod types;

pub use config::*;
pub use driver::*;
pub use error::*;
pub use logger::*;
pub use types::*;
