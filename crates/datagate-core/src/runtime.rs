//! Tokio runtime for drivers whose native client is async
//!
//! mysql_async and tokio-postgres need a Tokio reactor for DNS resolution
//! and networking, while the Datagate API is blocking. Each connection owns
//! a current-thread runtime and blocks on it per call, so nothing runs in
//! the background between calls.
//!
//! Blocking on a runtime from inside another runtime panics; the facades
//! must be driven from plain threads.

use tokio::runtime::{Builder, Runtime};

use crate::{DriverError, DriverResult};

/// Build the runtime owned by one connection
pub fn connection_runtime() -> DriverResult<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DriverError::new(format!("Failed to create Tokio runtime: {}", e)))
}
