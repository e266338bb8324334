//! Start/stop contract for long-lived engine components

use async_trait::async_trait;
use serde::Serialize;

use crate::engine::error::PoolResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Started,
    Stopped,
}

#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&self) -> PoolResult<()>;

    /// Releases everything acquired since `start`. Stopping a component
    /// that is not running is a no-op.
    async fn stop(&self) -> PoolResult<()>;

    async fn state(&self) -> LifecycleState;

    async fn is_started(&self) -> bool {
        self.state().await == LifecycleState::Started
    }
}
