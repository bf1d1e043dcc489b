//! Backend strategy traits
//!
//! Each relational backend crate provides one `SqlDriver` (DSN synthesis,
//! dialect fragments, connect) and one `NativeConnection` (the live handle).
//! The SQL facade picks the driver once, at construction.

use crate::{DbType, DriverResult, QueryResult, SqlParams, Value};

/// Backend-specific DDL fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    /// Storage-engine clause that supports foreign keys
    Engine,
    /// Auto-increment primary-key column clause
    Index,
    /// "now + delta seconds", in UTC
    Datetime { delta: i64 },
}

impl Fragment {
    /// Resolve a fragment by name; `delta` is read from `args` for `datetime`.
    ///
    /// Fractional deltas are truncated toward zero.
    ///
    /// Returns `None` for an unknown part.
    pub fn parse(part: &str, args: &[(&str, Value)]) -> Option<Self> {
        match part {
            "engine" => Some(Fragment::Engine),
            "index" => Some(Fragment::Index),
            "datetime" => {
                let delta = args
                    .iter()
                    .find(|(key, _)| *key == "delta")
                    .and_then(|(_, v)| {
                        v.as_i64()
                            .or_else(|| v.as_f64().map(|f| f.trunc() as i64))
                    })
                    .unwrap_or(0);
                Some(Fragment::Datetime { delta })
            }
            _ => None,
        }
    }

    /// Split a delta into its sign and magnitude, `+` for zero
    pub fn signed(delta: i64) -> (char, u64) {
        let sign = if delta >= 0 { '+' } else { '-' };
        (sign, delta.unsigned_abs())
    }
}

/// Per-backend strategy, selected once per connection
pub trait SqlDriver: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgres")
    fn name(&self) -> &'static str;

    /// The `dbtype` this driver serves
    fn dbtype(&self) -> DbType;

    /// Build the DSN text for verified params
    fn build_connection_string(&self, params: &SqlParams) -> String;

    /// Open the native connection
    fn connect(&self, params: &SqlParams) -> DriverResult<Box<dyn NativeConnection>>;

    /// Render a DDL fragment
    fn fragment(&self, fragment: Fragment) -> String;

    /// Suffix appended to inserts so the statement returns the new row.
    ///
    /// Backends without `RETURNING` support return `None` and report the
    /// generated key through `NativeConnection::last_insert_id`.
    fn returning_clause(&self, _key: Option<&str>) -> Option<String> {
        None
    }

    /// `SELECT` returning the server's Unix epoch in a column named `now`
    fn epoch_query(&self) -> &'static str;
}

/// A live backend connection, exclusively owned by its facade
pub trait NativeConnection: Send {
    /// Prepare, bind positional `?` parameters and execute
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<QueryResult>;

    /// Auto-increment key generated by the last insert
    fn last_insert_id(&mut self) -> DriverResult<Value>;

    fn begin_transaction(&mut self) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    /// Release the native handle
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// `<dbtype>:dbname=<name>[;host=<host>[;port=<port>]]`, shared by the server backends.
///
/// The port is only written when a host is.
pub fn build_server_dsn(params: &SqlParams) -> String {
    let mut dsn = format!("{}:dbname={}", params.dbtype, params.dbname);
    if let Some(host) = params.host() {
        dsn.push_str(&format!(";host={}", host));
        if let Some(port) = params.port() {
            dsn.push_str(&format!(";port={}", port));
        }
    }
    dsn
}
