//! `roomline.toml` loading with environment overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, RoomlineError};

pub const DEFAULT_CONFIG_FILE: &str = "roomline.toml";
pub const DEFAULT_HOMESERVER: &str = "https://matrix.org";
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 30_000;

pub const ENV_HOMESERVER: &str = "ROOMLINE_HOMESERVER";
pub const ENV_USER_ID: &str = "ROOMLINE_USER_ID";
pub const ENV_ROOM_ID: &str = "ROOMLINE_ROOM_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub homeserver: String,
    pub user_id: Option<String>,
    pub room_id: Option<String>,
    pub sync_timeout_ms: u64,
    pub redact_reason: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            homeserver: DEFAULT_HOMESERVER.to_string(),
            user_id: None,
            room_id: None,
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            redact_reason: None,
        }
    }
}

impl Config {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    /// Apply `ROOMLINE_*` variables from `lookup` over the file values.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(hs) = non_empty(ENV_HOMESERVER) {
            self.homeserver = hs;
        }
        if let Some(user) = non_empty(ENV_USER_ID) {
            self.user_id = Some(user);
        }
        if let Some(room) = non_empty(ENV_ROOM_ID) {
            self.room_id = Some(room);
        }
    }
}

pub fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Read `path`; `Ok(None)` when it does not exist.
pub fn load_file(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| RoomlineError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| RoomlineError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// File values (or defaults) with process environment overrides applied.
pub fn load(path: &Path) -> Result<Config> {
    let mut config = load_file(path)?.unwrap_or_default();
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
