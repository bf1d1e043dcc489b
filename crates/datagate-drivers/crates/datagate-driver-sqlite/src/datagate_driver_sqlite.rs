//! SQLite database driver implementation

mod connection;
mod driver;
#[cfg(test)]
mod driver_tests;

pub use connection::SqliteConnection;
pub use driver::SqliteDriver;
