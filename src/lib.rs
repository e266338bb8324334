// datasource-registry - descriptor-keyed database connection pools
// Core library

pub mod config;
pub mod engine;
pub mod observability;

use std::sync::Arc;

use config::PoolDefaults;
use engine::drivers::MySqlPoolEngine;
use engine::{PoolEngine, PoolFactory, PoolRegistry};

pub use engine::{ConnectionDescriptor, DataSource, DbType, PoolError, PoolResult};

/// Builds an unstarted registry over the given engine and defaults
pub fn registry_with(defaults: PoolDefaults, engine: Arc<dyn PoolEngine>) -> PoolRegistry {
    PoolRegistry::new(Arc::new(PoolFactory::new(defaults, engine)))
}

/// Registry over the SQLx MySQL engine, sized from the stored defaults
pub fn default_registry() -> PoolRegistry {
    registry_with(PoolDefaults::load(), Arc::new(MySqlPoolEngine::new()))
}
