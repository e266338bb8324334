//! Pool Factory
//!
//! Turns a descriptor plus the global defaults into one tuned pool.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::PoolDefaults;
use crate::engine::datasource::DataSource;
use crate::engine::error::{PoolError, PoolResult};
use crate::engine::profile::VendorProfile;
use crate::engine::traits::PoolEngine;
use crate::engine::types::{ConnectionDescriptor, PoolSettings};

/// Per-descriptor override of the pool-wide active connection limit
pub const MAX_ACTIVE_PROPERTY: &str = "maxActive";

pub struct PoolFactory {
    defaults: PoolDefaults,
    engine: Arc<dyn PoolEngine>,
}

impl PoolFactory {
    const NOT_FULL_TIMEOUT_RETRY_COUNT: u32 = 2;
    const TIME_BETWEEN_EVICTION_RUNS_MS: u64 = 60_000;
    const MIN_EVICTABLE_IDLE_TIME_MS: u64 = 1_800_000;
    const REMOVE_ABANDONED_TIMEOUT_SECS: u64 = 120;

    pub fn new(defaults: PoolDefaults, engine: Arc<dyn PoolEngine>) -> Self {
        Self { defaults, engine }
    }

    pub fn defaults(&self) -> &PoolDefaults {
        &self.defaults
    }

    /// Resolves the settings a pool for `descriptor` would be opened with
    pub fn settings_for(&self, descriptor: &ConnectionDescriptor) -> PoolResult<PoolSettings> {
        let max_active = self.effective_max_active(descriptor)?;
        let profile = VendorProfile::resolve(descriptor.vendor())?;

        // Caller properties first; vendor defaults only fill keys left unset.
        let mut connection_properties = descriptor.properties().clone();
        for (key, value) in profile.extra_properties {
            connection_properties
                .entry((*key).to_string())
                .or_insert_with(|| (*value).to_string());
        }

        let settings = PoolSettings {
            url: descriptor.endpoint().to_string(),
            username: descriptor.username().to_string(),
            password: descriptor.password().to_string(),
            vendor: descriptor.vendor().clone(),
            driver_id: profile.driver_id,

            initial_size: self.defaults.initial_size,
            min_idle: self.defaults.min_idle,
            max_active,
            max_wait: self.defaults.max_wait(),
            use_unfair_lock: true,
            not_full_timeout_retry_count: Self::NOT_FULL_TIMEOUT_RETRY_COUNT,

            time_between_eviction_runs: Duration::from_millis(Self::TIME_BETWEEN_EVICTION_RUNS_MS),
            min_evictable_idle_time: Duration::from_millis(Self::MIN_EVICTABLE_IDLE_TIME_MS),
            remove_abandoned: true,
            remove_abandoned_timeout: Duration::from_secs(Self::REMOVE_ABANDONED_TIMEOUT_SECS),
            log_abandoned: true,
            test_while_idle: true,
            test_on_borrow: false,
            test_on_return: false,

            validation_query: profile.validation_query,
            validation_query_timeout: profile.validation_query_timeout,
            exception_sorter: profile.exception_sorter,
            connection_checker: profile.connection_checker,
            connection_properties,
        };

        Self::check_sizing(&settings)?;
        Ok(settings)
    }

    /// Builds and opens a pool for `descriptor`
    ///
    /// Every failure comes back as `PoolError::Creation` carrying the cause.
    #[instrument(
        skip(self, descriptor),
        fields(url = %descriptor.endpoint(), vendor = %descriptor.vendor(), engine = self.engine.engine_id())
    )]
    pub async fn build(&self, descriptor: &ConnectionDescriptor) -> PoolResult<Arc<DataSource>> {
        let vendor = descriptor.vendor().clone();
        let settings = self
            .settings_for(descriptor)
            .map_err(|e| PoolError::creation(vendor.clone(), e))?;

        if !self.engine.supports(settings.driver_id) {
            return Err(PoolError::creation(
                vendor,
                PoolError::driver_unavailable(settings.driver_id),
            ));
        }

        let handle = self
            .engine
            .open(&settings)
            .await
            .map_err(|e| PoolError::creation(vendor, e))?;

        let data_source = DataSource::new(settings, handle);
        info!(
            pool_id = %data_source.id(),
            max_active = data_source.settings().max_active,
            "Data source created"
        );
        Ok(Arc::new(data_source))
    }

    fn effective_max_active(&self, descriptor: &ConnectionDescriptor) -> PoolResult<u32> {
        let Some(raw) = descriptor.property(MAX_ACTIVE_PROPERTY) else {
            return Ok(self.defaults.max_active);
        };

        let parsed: i64 = raw.trim().parse().map_err(|_| {
            PoolError::invalid_property(MAX_ACTIVE_PROPERTY, raw, "not an integer")
        })?;

        if parsed < 0 {
            warn!(
                max_active = parsed,
                fallback = self.defaults.max_active,
                "Negative maxActive, using default"
            );
            return Ok(self.defaults.max_active);
        }

        u32::try_from(parsed)
            .map_err(|_| PoolError::invalid_property(MAX_ACTIVE_PROPERTY, raw, "out of range"))
    }

    fn check_sizing(settings: &PoolSettings) -> PoolResult<()> {
        let max_active = settings.max_active.to_string();
        if settings.max_active == 0 {
            return Err(PoolError::invalid_property(
                MAX_ACTIVE_PROPERTY,
                max_active,
                "must be greater than 0",
            ));
        }
        if settings.min_idle > settings.max_active {
            return Err(PoolError::invalid_property(
                MAX_ACTIVE_PROPERTY,
                max_active,
                format!("less than minIdle ({})", settings.min_idle),
            ));
        }
        if settings.initial_size > settings.max_active {
            return Err(PoolError::invalid_property(
                MAX_ACTIVE_PROPERTY,
                max_active,
                format!("less than initialSize ({})", settings.initial_size),
            ));
        }
        Ok(())
    }
}
