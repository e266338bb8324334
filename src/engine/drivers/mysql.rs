//! MySQL Pool Engine
//!
//! Serves `mysql` driver profiles (MySQL and DRDS) with SQLx pools.
//!
//! ## Lazy connections
//!
//! Pools are created with `connect_lazy_with`: nothing is dialed until the
//! first borrow or the background `min_connections` refill, so an
//! unreachable server surfaces on first use rather than at construction.

use std::any::Any;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::mysql::{
    MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlSslMode,
};
use sqlx::Connection;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engine::error::{PoolError, PoolResult};
use crate::engine::profile::{ConnectionChecker, ExceptionSorter};
use crate::engine::traits::{PoolEngine, PoolHandle};
use crate::engine::types::PoolSettings;

const DRIVER_ID: &str = "mysql";
const JDBC_PREFIX: &str = "jdbc:";

/// Connection properties translated into SQLx options; the rest only
/// apply to JDBC drivers.
const MAPPED_PROPERTIES: &[&str] = &["useSSL", "characterEncoding"];

pub struct MySqlPoolEngine;

impl MySqlPoolEngine {
    pub fn new() -> Self {
        Self
    }

    /// Accepts both `mysql://` and JDBC-style `jdbc:mysql://` endpoints
    fn normalize_url(url: &str) -> &str {
        url.strip_prefix(JDBC_PREFIX).unwrap_or(url)
    }

    fn charset_for(encoding: &str) -> String {
        match encoding.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => "utf8mb4".to_string(),
            other => other.replace('-', ""),
        }
    }

    fn connect_options(settings: &PoolSettings) -> PoolResult<MySqlConnectOptions> {
        let url = Self::normalize_url(&settings.url);
        let mut options = MySqlConnectOptions::from_str(url)
            .map_err(|e| PoolError::invalid_property("url", url, e.to_string()))?
            .username(&settings.username)
            .password(&settings.password);

        if let Some(use_ssl) = settings.connection_property("useSSL") {
            let mode = match use_ssl.trim().to_ascii_lowercase().as_str() {
                "true" => MySqlSslMode::Required,
                "false" => MySqlSslMode::Disabled,
                other => {
                    return Err(PoolError::invalid_property(
                        "useSSL",
                        other,
                        "expected true or false",
                    ))
                }
            };
            options = options.ssl_mode(mode);
        }

        if let Some(encoding) = settings.connection_property("characterEncoding") {
            options = options.charset(&Self::charset_for(encoding));
        }

        let ignored: Vec<&str> = settings
            .connection_properties
            .keys()
            .map(String::as_str)
            .filter(|key| !MAPPED_PROPERTIES.iter().any(|mapped| mapped == key))
            .collect();
        if !ignored.is_empty() {
            debug!(properties = ?ignored, "Connection properties without a SQLx equivalent");
        }

        Ok(options)
    }

    fn pool_options(settings: &PoolSettings) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(settings.max_active)
            .min_connections(settings.min_idle)
            .acquire_timeout(settings.max_wait)
            .idle_timeout(settings.min_evictable_idle_time)
            .test_before_acquire(settings.test_on_borrow)
    }
}

impl Default for MySqlPoolEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoolEngine for MySqlPoolEngine {
    fn engine_id(&self) -> &'static str {
        "sqlx-mysql"
    }

    fn supports(&self, driver_id: &str) -> bool {
        driver_id == DRIVER_ID
    }

    async fn open(&self, settings: &PoolSettings) -> PoolResult<Box<dyn PoolHandle>> {
        if !self.supports(settings.driver_id) {
            return Err(PoolError::driver_unavailable(settings.driver_id));
        }

        let options = Self::connect_options(settings)?;
        let pool = Self::pool_options(settings).connect_lazy_with(options);

        Ok(Box::new(MySqlDataSourcePool {
            pool,
            checker: settings.connection_checker,
            exception_sorter: settings.exception_sorter,
            validation_query: settings.validation_query,
            validation_timeout: settings.validation_query_timeout.unwrap_or(settings.max_wait),
        }))
    }
}

/// SQLx pool plus the vendor health-check policy
pub struct MySqlDataSourcePool {
    pool: MySqlPool,
    checker: Option<ConnectionChecker>,
    exception_sorter: ExceptionSorter,
    validation_query: &'static str,
    validation_timeout: std::time::Duration,
}

impl MySqlDataSourcePool {
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// True when `error` means the connection that raised it is unusable
    fn is_fatal(&self, error: &sqlx::Error) -> bool {
        match error {
            sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::Tls(_) => true,
            sqlx::Error::Database(db_error) => db_error
                .try_downcast_ref::<MySqlDatabaseError>()
                .is_some_and(|e| self.exception_sorter.is_fatal(i32::from(e.number()))),
            _ => false,
        }
    }
}

#[async_trait]
impl PoolHandle for MySqlDataSourcePool {
    async fn close(&self) -> PoolResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn validate(&self) -> PoolResult<()> {
        let check = async {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| PoolError::engine(e.to_string()))?;

            let outcome = match self.checker {
                Some(ConnectionChecker::MySql) => conn.ping().await,
                _ => sqlx::query(self.validation_query)
                    .execute(&mut *conn)
                    .await
                    .map(|_| ()),
            };

            outcome.map_err(|e| {
                if self.is_fatal(&e) {
                    warn!(error = %e, "Fatal validation error, discarding connection");
                    conn.close_on_drop();
                }
                PoolError::engine(e.to_string())
            })
        };

        match timeout(self.validation_timeout, check).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::engine(format!(
                "validation timed out after {:?}",
                self.validation_timeout
            ))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::PoolDefaults;
    use crate::engine::factory::PoolFactory;
    use crate::engine::types::{ConnectionDescriptor, DbType};

    fn factory() -> PoolFactory {
        PoolFactory::new(
            PoolDefaults::default().with_initial_size(0).with_min_idle(0),
            Arc::new(MySqlPoolEngine::new()),
        )
    }

    #[test]
    fn strips_jdbc_prefix() {
        assert_eq!(
            MySqlPoolEngine::normalize_url("jdbc:mysql://db:3306/app"),
            "mysql://db:3306/app"
        );
        assert_eq!(
            MySqlPoolEngine::normalize_url("mysql://db:3306/app"),
            "mysql://db:3306/app"
        );
    }

    #[test]
    fn maps_jdbc_encodings_to_charsets() {
        assert_eq!(MySqlPoolEngine::charset_for("UTF-8"), "utf8mb4");
        assert_eq!(MySqlPoolEngine::charset_for("latin1"), "latin1");
        assert_eq!(MySqlPoolEngine::charset_for("GB-2312"), "gb2312");
    }

    #[test]
    fn rejects_malformed_ssl_flag() {
        let settings = factory()
            .settings_for(
                &ConnectionDescriptor::new("mysql://db/app", "app", "secret", DbType::MySql)
                    .with_property("useSSL", "maybe"),
            )
            .expect("settings");

        let err = MySqlPoolEngine::connect_options(&settings).expect_err("bad flag");
        assert!(matches!(err, PoolError::InvalidProperty { ref key, .. } if key == "useSSL"));
    }

    #[tokio::test]
    async fn builds_lazy_pool_and_closes_it() {
        let descriptor = ConnectionDescriptor::new(
            "jdbc:mysql://127.0.0.1:1/app",
            "app",
            "secret",
            DbType::Drds,
        )
        .with_property("maxActive", "4");

        let data_source = factory().build(&descriptor).await.expect("lazy pool");
        let pool = data_source
            .downcast_pool::<MySqlDataSourcePool>()
            .expect("sqlx pool");
        assert_eq!(pool.pool().options().get_max_connections(), 4);
        assert!(!data_source.is_closed());

        data_source.close().await.expect("close");
        assert!(data_source.is_closed());
        data_source.close().await.expect("second close is a no-op");
    }

    #[tokio::test]
    async fn classifies_broken_connections_as_fatal() {
        let descriptor =
            ConnectionDescriptor::new("mysql://127.0.0.1:1/app", "app", "secret", DbType::MySql);
        let data_source = factory().build(&descriptor).await.expect("lazy pool");
        let pool = data_source
            .downcast_pool::<MySqlDataSourcePool>()
            .expect("sqlx pool");

        assert_eq!(pool.exception_sorter, ExceptionSorter::MySql);
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(pool.is_fatal(&sqlx::Error::Io(reset)));
        assert!(!pool.is_fatal(&sqlx::Error::RowNotFound));

        data_source.close().await.expect("close");
    }

    #[tokio::test]
    async fn oracle_profiles_have_no_native_driver() {
        let descriptor = ConnectionDescriptor::new(
            "jdbc:oracle:thin:@db:1521:orcl",
            "scott",
            "tiger",
            DbType::Oracle,
        );

        let err = factory().build(&descriptor).await.expect_err("no driver");
        assert!(err.is_creation());
        assert!(matches!(err.root_cause(), PoolError::DriverUnavailable { .. }));
    }
}
