//! PostgreSQL database driver implementation

mod connection;
mod driver;
#[cfg(test)]
mod driver_tests;
mod placeholders;
#[cfg(test)]
mod placeholders_tests;
mod types;
#[cfg(test)]
mod types_tests;

pub use connection::PostgresConnection;
pub use driver::PostgresDriver;
pub use placeholders::rewrite_placeholders;
