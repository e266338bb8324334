//! Data Source
//!
//! A tuned pool as handed out by the registry. Callers borrow connections
//! through the engine handle but never own the pool.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::error::PoolResult;
use crate::engine::traits::PoolHandle;
use crate::engine::types::PoolSettings;

pub struct DataSource {
    id: Uuid,
    settings: PoolSettings,
    handle: Box<dyn PoolHandle>,
    closed: AtomicBool,
}

impl DataSource {
    pub fn new(settings: PoolSettings, handle: Box<dyn PoolHandle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            handle,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn handle(&self) -> &dyn PoolHandle {
        self.handle.as_ref()
    }

    /// Engine-specific pool, e.g. `MySqlDataSourcePool`
    pub fn downcast_pool<T: Any>(&self) -> Option<&T> {
        self.handle.as_any().downcast_ref::<T>()
    }

    /// Closes the pool. Once the engine has released it, later calls are
    /// no-ops; a failed close leaves the pool open so it can be retried.
    pub async fn close(&self) -> PoolResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            debug!(pool_id = %self.id, "Data source already closed");
            return Ok(());
        }

        self.handle.close().await?;
        self.closed.store(true, Ordering::SeqCst);
        info!(
            pool_id = %self.id,
            url = %self.settings.url,
            vendor = %self.settings.vendor,
            "Data source closed"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.handle.is_closed()
    }

    pub async fn validate(&self) -> PoolResult<()> {
        self.handle.validate().await
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("closed", &self.is_closed())
            .finish()
    }
}
