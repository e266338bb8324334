//! Pooling engine abstraction
//!
//! The registry never manages connections itself. It hands resolved
//! `PoolSettings` to a `PoolEngine`, which returns a live `PoolHandle`.
//! Engines are free to create connections eagerly or on first borrow.

use std::any::Any;

use async_trait::async_trait;

use crate::engine::error::{PoolError, PoolResult};
use crate::engine::types::PoolSettings;

/// Builds pools for the driver profiles it supports
#[async_trait]
pub trait PoolEngine: Send + Sync {
    /// Returns the unique identifier for this engine (e.g., "sqlx-mysql")
    fn engine_id(&self) -> &'static str;

    /// Returns true if `driver_id` (e.g., "mysql") can be served
    fn supports(&self, driver_id: &str) -> bool;

    /// Creates a pool configured from `settings`
    ///
    /// Implementations must not hand out connections that ignore the
    /// sizing limits in `settings`.
    async fn open(&self, settings: &PoolSettings) -> PoolResult<Box<dyn PoolHandle>>;
}

/// A live pool owned by a `DataSource`
#[async_trait]
pub trait PoolHandle: Send + Sync {
    /// Releases every underlying connection and rejects further borrows
    async fn close(&self) -> PoolResult<()>;

    fn is_closed(&self) -> bool;

    /// Borrows one connection and checks its health
    ///
    /// Uses the configured connection checker, falling back to the
    /// validation query.
    async fn validate(&self) -> PoolResult<()> {
        Err(PoolError::engine(
            "Connection validation is not supported by this engine",
        ))
    }

    /// Access to the engine-specific pool type
    fn as_any(&self) -> &dyn Any;
}
