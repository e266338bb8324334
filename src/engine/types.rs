//! Value types shared by the pool factory and the registry
//!
//! `ConnectionDescriptor` is the registry key, `PoolSettings` the fully
//! resolved configuration handed to a pooling engine.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::profile::{ConnectionChecker, ExceptionSorter};

/// Ordered string properties, passed through to the driver as-is
pub type ConnectionProperties = BTreeMap<String, String>;

/// Database vendor of a descriptor
///
/// Unrecognized tags are kept in `Unknown` so that profile resolution can
/// report them as a configuration error instead of degrading silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DbType {
    Oracle,
    MySql,
    /// MySQL-compatible distributed database
    Drds,
    SqlServer,
    Unknown(String),
}

impl DbType {
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "oracle" => Self::Oracle,
            "mysql" => Self::MySql,
            "drds" => Self::Drds,
            "sqlserver" | "sql server" | "sql_server" | "mssql" => Self::SqlServer,
            _ => Self::Unknown(tag.to_string()),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oracle => f.write_str("Oracle"),
            Self::MySql => f.write_str("MySQL"),
            Self::Drds => f.write_str("DRDS"),
            Self::SqlServer => f.write_str("SQL Server"),
            Self::Unknown(tag) => f.write_str(tag),
        }
    }
}

impl FromStr for DbType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl From<String> for DbType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<DbType> for String {
    fn from(db_type: DbType) -> Self {
        db_type.to_string()
    }
}

/// Logical database target, used as the pool registry key
///
/// Equality and hashing are structural over every field, properties
/// included, so two descriptors built separately from the same values
/// resolve to the same pool.
///
/// The password is never serialized. A descriptor read back from its own
/// JSON has an empty password and is therefore a different registry key
/// until the password is supplied again.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    endpoint: String,
    username: String,
    #[serde(skip_serializing, default)]
    password: String,
    vendor: DbType,
    #[serde(default)]
    properties: ConnectionProperties,
}

impl ConnectionDescriptor {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        vendor: DbType,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            vendor,
            properties: ConnectionProperties::new(),
        }
    }

    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn vendor(&self) -> &DbType {
        &self.vendor
    }

    pub fn properties(&self) -> &ConnectionProperties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"***")
            .field("vendor", &self.vendor)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Resolved configuration of one pool, fixed at construction
#[derive(Clone)]
pub struct PoolSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub vendor: DbType,
    pub driver_id: &'static str,

    pub initial_size: u32,
    pub min_idle: u32,
    pub max_active: u32,
    pub max_wait: Duration,
    /// Favors throughput over FIFO fairness among waiters
    pub use_unfair_lock: bool,
    /// Lock acquisition timeouts tolerated before a wait fails
    pub not_full_timeout_retry_count: u32,

    pub time_between_eviction_runs: Duration,
    pub min_evictable_idle_time: Duration,
    pub remove_abandoned: bool,
    pub remove_abandoned_timeout: Duration,
    pub log_abandoned: bool,
    pub test_while_idle: bool,
    pub test_on_borrow: bool,
    pub test_on_return: bool,

    pub validation_query: &'static str,
    pub validation_query_timeout: Option<Duration>,
    pub exception_sorter: ExceptionSorter,
    pub connection_checker: Option<ConnectionChecker>,
    pub connection_properties: ConnectionProperties,
}

impl PoolSettings {
    pub fn connection_property(&self, key: &str) -> Option<&str> {
        self.connection_properties.get(key).map(String::as_str)
    }
}

impl fmt::Debug for PoolSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("vendor", &self.vendor)
            .field("driver_id", &self.driver_id)
            .field("initial_size", &self.initial_size)
            .field("min_idle", &self.min_idle)
            .field("max_active", &self.max_active)
            .field("max_wait", &self.max_wait)
            .field("validation_query", &self.validation_query)
            .field("connection_properties", &self.connection_properties)
            .finish_non_exhaustive()
    }
}
