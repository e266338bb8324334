//! Vendor profiles
//!
//! Per-vendor pool tuning: validation query, error classification,
//! connection health checks and driver connection properties.

use std::time::Duration;

use tracing::error;

use crate::engine::error::{PoolError, PoolResult};
use crate::engine::types::DbType;

/// Decides whether a vendor error code means the connection is unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionSorter {
    Oracle,
    MySql,
    /// Never evicts a connection on error
    Null,
}

impl ExceptionSorter {
    /// True when a connection that raised `vendor_code` must be discarded.
    pub fn is_fatal(&self, vendor_code: i32) -> bool {
        match self {
            Self::MySql => matches!(
                vendor_code,
                1040 | 1042
                    | 1043
                    | 1045
                    | 1047
                    | 1081
                    | 1129
                    | 1130
                    | 1004
                    | 1005
                    | 1015
                    | 1021
                    | 1037
                    | 1038
                    | 1317
                    | 2000..=2999
            ),
            Self::Oracle => vendor_code
                .checked_abs()
                .is_some_and(|code| ORACLE_FATAL_CODES.contains(&code)),
            Self::Null => false,
        }
    }
}

const ORACLE_FATAL_CODES: &[i32] = &[
    28, 600, 1012, 1014, 1033, 1034, 1035, 1089, 1090, 1092, 1094, 2396, 3106, 3111, 3113, 3114,
    3134, 3135, 3136, 3138, 3142, 3143, 3144, 3145, 3149, 6801, 6802, 6805, 9918, 9920, 9921,
    17001, 17002, 17008, 17024, 17089, 17401, 17410, 17447, 24794, 25407, 25408, 25409, 25425,
    29276, 30676,
];

/// How an idle connection's health is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionChecker {
    /// Protocol-level ping
    MySql,
    /// Runs the validation query under the validation timeout
    SqlServer,
}

/// Tuning bundle for one vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorProfile {
    pub validation_query: &'static str,
    pub validation_query_timeout: Option<Duration>,
    pub exception_sorter: ExceptionSorter,
    pub connection_checker: Option<ConnectionChecker>,
    pub extra_properties: &'static [(&'static str, &'static str)],
    pub driver_id: &'static str,
}

const ORACLE_PROPERTIES: &[(&str, &str)] = &[
    ("restrictGetTables", "true"),
    ("oracle.jdbc.V8Compatible", "true"),
];

const MYSQL_PROPERTIES: &[(&str, &str)] = &[
    ("useServerPrepStmts", "false"),
    ("rewriteBatchedStatements", "true"),
    ("allowMultiQueries", "true"),
    ("readOnlyPropagatesToServer", "false"),
    ("useSSL", "false"),
];

impl VendorProfile {
    pub fn resolve(vendor: &DbType) -> PoolResult<Self> {
        match vendor {
            DbType::Oracle => Ok(Self {
                validation_query: "select 1 from dual",
                validation_query_timeout: None,
                exception_sorter: ExceptionSorter::Oracle,
                connection_checker: None,
                extra_properties: ORACLE_PROPERTIES,
                driver_id: "oracle",
            }),
            DbType::MySql | DbType::Drds => Ok(Self {
                validation_query: "select 1",
                validation_query_timeout: None,
                exception_sorter: ExceptionSorter::MySql,
                connection_checker: Some(ConnectionChecker::MySql),
                extra_properties: MYSQL_PROPERTIES,
                driver_id: "mysql",
            }),
            DbType::SqlServer => Ok(Self {
                validation_query: "select 1",
                validation_query_timeout: Some(Duration::from_secs(5)),
                exception_sorter: ExceptionSorter::Null,
                connection_checker: Some(ConnectionChecker::SqlServer),
                extra_properties: &[],
                driver_id: "mssql",
            }),
            DbType::Unknown(tag) => {
                error!(vendor = %tag, "Unknown database type");
                Err(PoolError::configuration(tag.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_profile() {
        let profile = VendorProfile::resolve(&DbType::Oracle).expect("oracle is supported");

        assert_eq!(profile.validation_query, "select 1 from dual");
        assert_eq!(profile.exception_sorter, ExceptionSorter::Oracle);
        assert_eq!(profile.connection_checker, None);
        assert!(profile.extra_properties.contains(&("restrictGetTables", "true")));
        assert!(profile.extra_properties.contains(&("oracle.jdbc.V8Compatible", "true")));
    }

    #[test]
    fn mysql_family_shares_one_profile() {
        let mysql = VendorProfile::resolve(&DbType::MySql).expect("mysql is supported");
        let drds = VendorProfile::resolve(&DbType::Drds).expect("drds is supported");

        assert_eq!(mysql, drds);
        assert_eq!(mysql.validation_query, "select 1");
        assert_eq!(mysql.connection_checker, Some(ConnectionChecker::MySql));
        assert!(mysql.extra_properties.contains(&("rewriteBatchedStatements", "true")));
        assert!(mysql.extra_properties.contains(&("useServerPrepStmts", "false")));
        assert!(mysql.extra_properties.contains(&("allowMultiQueries", "true")));
        assert!(mysql.extra_properties.contains(&("useSSL", "false")));
        assert!(mysql.extra_properties.contains(&("readOnlyPropagatesToServer", "false")));
    }

    #[test]
    fn sql_server_profile() {
        let profile = VendorProfile::resolve(&DbType::SqlServer).expect("sql server is supported");

        assert_eq!(profile.validation_query, "select 1");
        assert_eq!(profile.validation_query_timeout, Some(Duration::from_secs(5)));
        assert_eq!(profile.exception_sorter, ExceptionSorter::Null);
        assert_eq!(profile.connection_checker, Some(ConnectionChecker::SqlServer));
        assert!(profile.extra_properties.is_empty());
    }

    #[test]
    fn unknown_vendor_is_a_configuration_error() {
        let err = VendorProfile::resolve(&DbType::from_tag("DB2")).expect_err("db2 is unsupported");

        assert!(matches!(err, PoolError::Configuration { ref vendor } if vendor == "DB2"));
    }

    #[test]
    fn exception_sorters_classify_fatal_codes() {
        assert!(ExceptionSorter::MySql.is_fatal(1045));
        assert!(ExceptionSorter::MySql.is_fatal(2013));
        assert!(!ExceptionSorter::MySql.is_fatal(1062));

        assert!(ExceptionSorter::Oracle.is_fatal(3113));
        assert!(ExceptionSorter::Oracle.is_fatal(-17002));
        assert!(!ExceptionSorter::Oracle.is_fatal(1));

        assert!(!ExceptionSorter::Null.is_fatal(2013));
    }
}
