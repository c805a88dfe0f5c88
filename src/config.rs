use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::metrics::OverflowPolicy;
use crate::prefs::DEFAULT_SESSIONS_TARGET;
use crate::session::SessionConfig;
use crate::tier::{Catalog, TierId};

/// Settings remembered between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub tier: TierId,
    /// `None` means the tier's own time limit
    pub duration_secs: Option<u32>,
    pub sessions_target: u32,
    pub overflow: OverflowPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tier: TierId::Beginner,
            duration_secs: None,
            sessions_target: DEFAULT_SESSIONS_TARGET,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl Config {
    /// Resolve against the catalog, falling back to the tier's time limit
    /// when no duration was chosen or the stored one is no longer offered.
    pub fn session_config(&self, catalog: &Catalog) -> SessionConfig {
        let tier_limit = catalog.tier(self.tier).map(|t| t.time_limit_secs);
        let duration_secs = self
            .duration_secs
            .filter(|secs| catalog.allows_duration(*secs))
            .or(tier_limit)
            .unwrap_or(crate::tier::DEFAULT_DURATION_SECS);

        SessionConfig {
            tier: self.tier,
            duration_secs,
            overflow: self.overflow,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("typemaster_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "config file is malformed, using defaults");
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
