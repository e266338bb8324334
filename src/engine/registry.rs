//! Pool Registry
//!
//! Descriptor-keyed cache of data sources. A pool is built the first time
//! its descriptor is requested and lives until the registry is stopped.
//!
//! Construction is single-flight per descriptor: the first caller spawns
//! the build, later callers for the same key await the same shared
//! outcome. The map lock is never held while a pool is being built, so
//! lookups for different descriptors do not wait on each other.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::datasource::DataSource;
use crate::engine::error::{CloseFailure, PoolError, PoolResult, ShutdownError};
use crate::engine::factory::PoolFactory;
use crate::engine::lifecycle::{Lifecycle, LifecycleState};
use crate::engine::types::{ConnectionDescriptor, ConnectionProperties, DbType};

type BuildFuture = Shared<BoxFuture<'static, PoolResult<Arc<DataSource>>>>;

enum Slot {
    Ready(Arc<DataSource>),
    Building(BuildFuture),
}

struct RegistryState {
    lifecycle: LifecycleState,
    /// Bumped on every stop so late builds from a previous run are discarded
    generation: u64,
    slots: HashMap<ConnectionDescriptor, Slot>,
}

impl RegistryState {
    fn ensure_started(&self) -> PoolResult<()> {
        match self.lifecycle {
            LifecycleState::Started => Ok(()),
            LifecycleState::Uninitialized => Err(PoolError::NotStarted),
            LifecycleState::Stopped => Err(PoolError::Stopped),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lifecycle == LifecycleState::Started && self.generation == generation
    }
}

enum Lookup {
    Ready(Arc<DataSource>),
    Wait(BuildFuture),
}

/// Shared, explicitly constructed pool registry
pub struct PoolRegistry {
    factory: Arc<PoolFactory>,
    state: Arc<RwLock<RegistryState>>,
}

impl PoolRegistry {
    pub fn new(factory: Arc<PoolFactory>) -> Self {
        Self {
            factory,
            state: Arc::new(RwLock::new(RegistryState {
                lifecycle: LifecycleState::Uninitialized,
                generation: 0,
                slots: HashMap::new(),
            })),
        }
    }

    pub fn factory(&self) -> &PoolFactory {
        &self.factory
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> PoolResult<()> {
        let mut state = self.state.write().await;
        if state.lifecycle == LifecycleState::Started {
            return Err(PoolError::AlreadyStarted);
        }

        state.slots = HashMap::new();
        state.lifecycle = LifecycleState::Started;
        info!(generation = state.generation, "Pool registry started");
        Ok(())
    }

    /// Closes every cached pool and empties the registry
    ///
    /// All pools are closed even if some fail; the failures are returned
    /// together as `PoolError::Shutdown`.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> PoolResult<()> {
        let ready: Vec<(ConnectionDescriptor, Arc<DataSource>)> = {
            let mut state = self.state.write().await;
            if state.lifecycle != LifecycleState::Started {
                debug!(state = ?state.lifecycle, "Pool registry not running, nothing to stop");
                return Ok(());
            }

            state.lifecycle = LifecycleState::Stopped;
            state.generation += 1;
            state
                .slots
                .drain()
                .filter_map(|(descriptor, slot)| match slot {
                    Slot::Ready(data_source) => Some((descriptor, data_source)),
                    // The build task sees the new generation and closes its own pool
                    Slot::Building(_) => None,
                })
                .collect()
        };

        let outcomes = join_all(ready.iter().map(|(descriptor, data_source)| async move {
            (descriptor, data_source.close().await)
        }))
        .await;

        let failures: Vec<CloseFailure> = outcomes
            .into_iter()
            .filter_map(|(descriptor, outcome)| {
                outcome.err().map(|error| {
                    warn!(
                        url = %descriptor.endpoint(),
                        vendor = %descriptor.vendor(),
                        error = %error,
                        "Failed to close data source"
                    );
                    CloseFailure {
                        endpoint: descriptor.endpoint().to_string(),
                        vendor: descriptor.vendor().clone(),
                        error,
                    }
                })
            })
            .collect();

        info!(
            closed = ready.len() - failures.len(),
            failed = failures.len(),
            "Pool registry stopped"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { failures }.into())
        }
    }

    /// Returns the pool for `descriptor`, building it on first use
    #[instrument(
        skip(self, descriptor),
        fields(url = %descriptor.endpoint(), vendor = %descriptor.vendor())
    )]
    pub async fn get(&self, descriptor: &ConnectionDescriptor) -> PoolResult<Arc<DataSource>> {
        let lookup = {
            let state = self.state.read().await;
            state.ensure_started()?;
            match state.slots.get(descriptor) {
                Some(Slot::Ready(data_source)) => Some(Lookup::Ready(Arc::clone(data_source))),
                Some(Slot::Building(build)) => Some(Lookup::Wait(build.clone())),
                None => None,
            }
        };

        let lookup = match lookup {
            Some(lookup) => lookup,
            None => {
                let mut state = self.state.write().await;
                state.ensure_started()?;
                match state.slots.get(descriptor) {
                    Some(Slot::Ready(data_source)) => Lookup::Ready(Arc::clone(data_source)),
                    Some(Slot::Building(build)) => Lookup::Wait(build.clone()),
                    None => {
                        let build = self.spawn_build(descriptor.clone(), state.generation);
                        state
                            .slots
                            .insert(descriptor.clone(), Slot::Building(build.clone()));
                        Lookup::Wait(build)
                    }
                }
            }
        };

        match lookup {
            Lookup::Ready(data_source) => Ok(data_source),
            Lookup::Wait(build) => build.await,
        }
    }

    /// Same as `get`, from raw descriptor fields
    pub async fn get_by_parts(
        &self,
        endpoint: &str,
        username: &str,
        password: &str,
        vendor: DbType,
        properties: Option<ConnectionProperties>,
    ) -> PoolResult<Arc<DataSource>> {
        let descriptor = ConnectionDescriptor::new(endpoint, username, password, vendor)
            .with_properties(properties.unwrap_or_default());
        self.get(&descriptor).await
    }

    /// Number of ready pools
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// True if a ready pool is cached for `descriptor`
    pub async fn contains(&self, descriptor: &ConnectionDescriptor) -> bool {
        let state = self.state.read().await;
        matches!(state.slots.get(descriptor), Some(Slot::Ready(_)))
    }

    pub async fn state(&self) -> LifecycleState {
        self.state.read().await.lifecycle
    }

    /// Runs the build on its own task so an abandoned caller does not
    /// cancel it for the remaining waiters.
    ///
    /// Every failure, panics included, clears the in-flight slot so the
    /// next `get` for the descriptor builds again.
    fn spawn_build(&self, descriptor: ConnectionDescriptor, generation: u64) -> BuildFuture {
        let factory = Arc::clone(&self.factory);
        let state = Arc::clone(&self.state);
        let vendor = descriptor.vendor().clone();
        let key = descriptor.clone();

        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                let outcome = AssertUnwindSafe(factory.build(&descriptor))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        error!(panic = %message, "Pool construction panicked");
                        Err(PoolError::creation(
                            descriptor.vendor().clone(),
                            PoolError::internal(format!("pool construction panicked: {message}")),
                        ))
                    });

                let mut guard = state.write().await;
                let current = guard.is_current(generation);
                match outcome {
                    Ok(data_source) if current => {
                        guard
                            .slots
                            .insert(descriptor, Slot::Ready(Arc::clone(&data_source)));
                        Ok(data_source)
                    }
                    Ok(data_source) => {
                        drop(guard);
                        debug!(pool_id = %data_source.id(), "Registry stopped during build, closing orphan pool");
                        if let Err(e) = data_source.close().await {
                            warn!(pool_id = %data_source.id(), error = %e, "Failed to close orphan pool");
                        }
                        Err(PoolError::Stopped)
                    }
                    Err(e) => {
                        if current {
                            guard.slots.remove(&descriptor);
                        }
                        Err(e)
                    }
                }
            }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let mut guard = state.write().await;
                    if guard.is_current(generation)
                        && matches!(guard.slots.get(&key), Some(Slot::Building(_)))
                    {
                        guard.slots.remove(&key);
                    }
                    Err(PoolError::creation(
                        vendor,
                        PoolError::internal(format!("pool construction task failed: {join_error}")),
                    ))
                }
            }
        }
        .boxed()
        .shared()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[async_trait]
impl Lifecycle for PoolRegistry {
    async fn start(&self) -> PoolResult<()> {
        PoolRegistry::start(self).await
    }

    async fn stop(&self) -> PoolResult<()> {
        PoolRegistry::stop(self).await
    }

    async fn state(&self) -> LifecycleState {
        PoolRegistry::state(self).await
    }
}
