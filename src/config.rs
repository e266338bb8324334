//! Global pool sizing defaults.
//!
//! Defaults are persisted to a per-user config file. Environment variables
//! override any stored values so managed deployments can pin pool sizes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolDefaults {
    pub initial_size: u32,
    pub min_idle: u32,
    pub max_active: u32,
    pub max_wait_ms: u64,
}

fn env_u64_opt(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
}

fn env_u32_opt(key: &str) -> Option<u32> {
    env_u64_opt(key).and_then(|value| u32::try_from(value).ok())
}

fn config_path() -> PathBuf {
    if cfg!(windows) {
        let appdata = std::env::var_os("APPDATA")
            .unwrap_or_else(|| std::env::var_os("USERPROFILE").unwrap_or_default());
        let mut path = PathBuf::from(appdata);
        path.push("DatasourceRegistry");
        path.push("pool.json");
        path
    } else {
        let home = std::env::var_os("HOME").unwrap_or_default();
        let mut path = PathBuf::from(home);
        path.push(".datasource-registry");
        path.push("pool.json");
        path
    }
}

fn load_from_file(path: &Path) -> Option<PoolDefaults> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

impl PoolDefaults {
    fn defaults() -> Self {
        Self {
            initial_size: 20,
            min_idle: 1,
            max_active: 200,
            max_wait_ms: 30_000,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(value) = env_u32_opt("DSREG_INITIAL_SIZE") {
            self.initial_size = value;
        }
        if let Some(value) = env_u32_opt("DSREG_MIN_IDLE") {
            self.min_idle = value;
        }
        if let Some(value) = env_u32_opt("DSREG_MAX_ACTIVE") {
            self.max_active = value;
        }
        if let Some(value) = env_u64_opt("DSREG_MAX_WAIT_MS") {
            self.max_wait_ms = value;
        }
    }

    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut defaults = load_from_file(path).unwrap_or_else(Self::defaults);
        defaults.apply_env_overrides();
        defaults
    }

    pub fn save_to_file(&self) -> Result<(), String> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let payload =
            serde_json::to_string_pretty(self).map_err(|e| format!("Save failed: {}", e))?;
        fs::write(path, payload).map_err(|e| format!("Save failed: {}", e))?;
        Ok(())
    }

    pub fn with_initial_size(mut self, initial_size: u32) -> Self {
        self.initial_size = initial_size;
        self
    }

    pub fn with_min_idle(mut self, min_idle: u32) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn with_max_active(mut self, max_active: u32) -> Self {
        self.max_active = max_active;
        self
    }

    pub fn with_max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = max_wait_ms;
        self
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self::defaults()
    }
}
