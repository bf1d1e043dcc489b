//! Registry of the compiled-in SQL backends

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use datagate_core::{DbType, SqlDriver};

/// Shared registry used by `Sql::new`
static DEFAULT_REGISTRY: LazyLock<DriverRegistry> = LazyLock::new(DriverRegistry::with_defaults);

/// Registry of available SQL drivers, keyed by normalized `dbtype`
pub struct DriverRegistry {
    drivers: HashMap<DbType, Arc<dyn SqlDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with every driver enabled by cargo features
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));
        #[cfg(feature = "mysql")]
        registry.register(Arc::new(crate::mysql::MySqlDriver::new()));

        registry
    }

    /// The process-wide registry built from the default drivers
    pub fn global() -> &'static DriverRegistry {
        &DEFAULT_REGISTRY
    }

    /// Register a driver, replacing any previous one for the same `dbtype`
    pub fn register(&mut self, driver: Arc<dyn SqlDriver>) {
        let dbtype = driver.dbtype();
        tracing::info!(driver = driver.name(), %dbtype, "registering database driver");
        self.drivers.insert(dbtype, driver);
    }

    pub fn get(&self, dbtype: DbType) -> Option<Arc<dyn SqlDriver>> {
        let driver = self.drivers.get(&dbtype).cloned();
        if driver.is_none() {
            tracing::warn!(%dbtype, "driver not found in registry");
        }
        driver
    }

    /// List all registered backends
    pub fn list(&self) -> Vec<DbType> {
        self.drivers.keys().copied().collect()
    }

    pub fn has(&self, dbtype: DbType) -> bool {
        self.drivers.contains_key(&dbtype)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
