//! Engine errors
//!
//! Every error is `Clone`: a failed pool construction is shared with all
//! callers that were waiting on it.

use std::fmt;

use thiserror::Error;

use crate::engine::types::DbType;

pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error("unsupported database type: {vendor}")]
    Configuration { vendor: String },

    #[error("invalid pool property {key}={value}: {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    #[error("pool engine error: {message}")]
    Engine { message: String },

    #[error("no native driver available for '{driver}'")]
    DriverUnavailable { driver: String },

    #[error("create data source error for {vendor}")]
    Creation {
        vendor: DbType,
        #[source]
        cause: Box<PoolError>,
    },

    #[error("pool registry has not been started")]
    NotStarted,

    #[error("pool registry is already started")]
    AlreadyStarted,

    #[error("pool registry has been stopped")]
    Stopped,

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PoolError {
    pub fn configuration(vendor: impl Into<String>) -> Self {
        Self::Configuration {
            vendor: vendor.into(),
        }
    }

    pub fn invalid_property(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    pub fn driver_unavailable(driver: impl Into<String>) -> Self {
        Self::DriverUnavailable {
            driver: driver.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wraps a construction failure, leaving already wrapped errors alone.
    pub fn creation(vendor: DbType, cause: PoolError) -> Self {
        match cause {
            already @ Self::Creation { .. } => already,
            cause => Self::Creation {
                vendor,
                cause: Box::new(cause),
            },
        }
    }

    /// Innermost error of a `Creation` chain.
    pub fn root_cause(&self) -> &PoolError {
        match self {
            Self::Creation { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// True when this error, or what it wraps, is an unsupported vendor.
    pub fn is_configuration(&self) -> bool {
        matches!(self.root_cause(), Self::Configuration { .. })
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }
}

/// A pool that could not be closed during shutdown.
#[derive(Debug, Clone)]
pub struct CloseFailure {
    pub endpoint: String,
    pub vendor: DbType,
    pub error: PoolError,
}

/// Every close failure of one `stop()` call.
#[derive(Debug, Clone, Error)]
pub struct ShutdownError {
    pub failures: Vec<CloseFailure>,
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pool(s) failed to close", self.failures.len())?;
        for failure in &self.failures {
            write!(
                f,
                "; {} ({}): {}",
                failure.endpoint, failure.vendor, failure.error
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn creation_keeps_cause_chain() {
        let err = PoolError::creation(DbType::from_tag("db2"), PoolError::configuration("db2"));

        assert!(err.is_creation());
        assert!(err.is_configuration());
        let source = err.source().expect("creation should expose its cause");
        assert_eq!(source.to_string(), "unsupported database type: db2");
    }

    #[test]
    fn creation_is_not_wrapped_twice() {
        let inner = PoolError::creation(DbType::MySql, PoolError::engine("refused"));
        let outer = PoolError::creation(DbType::MySql, inner);

        match outer {
            PoolError::Creation { cause, .. } => {
                assert!(matches!(*cause, PoolError::Engine { .. }))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn shutdown_error_lists_every_failure() {
        let err = ShutdownError {
            failures: vec![
                CloseFailure {
                    endpoint: "mysql://a".into(),
                    vendor: DbType::MySql,
                    error: PoolError::engine("boom"),
                },
                CloseFailure {
                    endpoint: "mysql://b".into(),
                    vendor: DbType::Drds,
                    error: PoolError::engine("bang"),
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("2 pool(s) failed to close"));
        assert!(message.contains("mysql://a"));
        assert!(message.contains("bang"));
    }
}
