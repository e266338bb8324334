//! Logging and observability helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "datasource-registry.log";
const DEFAULT_FILTER: &str = "datasource_registry=info";

pub fn init_tracing() {
    let _ = init_tracing_in(&log_directory());
}

/// Installs the global subscriber writing daily-rolled files under `log_dir`.
///
/// Returns `Ok(false)` if a subscriber was already installed.
pub fn init_tracing_in(log_dir: &Path) -> io::Result<bool> {
    fs::create_dir_all(log_dir)?;

    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    Ok(tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .try_init()
        .is_ok())
}

fn log_directory() -> PathBuf {
    if cfg!(windows) {
        let appdata = std::env::var_os("APPDATA")
            .unwrap_or_else(|| std::env::var_os("USERPROFILE").unwrap_or_default());
        let mut path = PathBuf::from(appdata);
        path.push("DatasourceRegistry");
        path.push("logs");
        path
    } else {
        let home = std::env::var_os("HOME").unwrap_or_default();
        let mut path = PathBuf::from(home);
        path.push(".datasource-registry");
        path.push("logs");
        path
    }
}
