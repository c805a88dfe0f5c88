use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PrefsError;

const IDENTITY_KEY: &str = "identity";
const STATS_KEY: &str = "aggregate_stats";

pub const DEFAULT_SESSIONS_TARGET: u32 = 10;

/// Who is taking the test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
        }
    }

    /// Placeholder used for attempts finished before an identity was entered
    pub fn anonymous() -> Self {
        Self::new("Anonymous", "")
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty");
        }
        match self.email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(())
            }
            _ => Err("email must look like name@domain"),
        }
    }
}

/// Rolling averages across completed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub average_wpm: u32,
    pub average_accuracy: u32,
    pub sessions_completed: u32,
    pub sessions_target: u32,
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self {
            average_wpm: 0,
            average_accuracy: 0,
            sessions_completed: 0,
            sessions_target: DEFAULT_SESSIONS_TARGET,
        }
    }
}

impl AggregateStats {
    /// Fold one finished attempt into the running means
    pub fn record(&self, wpm: u32, accuracy: u8) -> Self {
        let completed = self.sessions_completed.saturating_add(1);
        let running_mean = |avg: u32, value: u32| -> u32 {
            let total = avg as f64 * self.sessions_completed as f64 + value as f64;
            (total / completed as f64).round() as u32
        };

        Self {
            average_wpm: running_mean(self.average_wpm, wpm),
            average_accuracy: running_mean(self.average_accuracy, accuracy as u32).min(100),
            sessions_completed: completed,
            sessions_target: self.sessions_target,
        }
    }

    /// Fraction of the session target reached, capped at 1.0
    pub fn progress(&self) -> f64 {
        if self.sessions_target == 0 {
            return 1.0;
        }
        (self.sessions_completed as f64 / self.sessions_target as f64).min(1.0)
    }
}

/// Durable key-value storage for identity and aggregate stats
pub trait PreferenceCache {
    fn identity(&self) -> Option<Identity>;
    fn set_identity(&mut self, identity: &Identity) -> Result<(), PrefsError>;
    fn aggregate_stats(&self) -> AggregateStats;
    fn set_aggregate_stats(&mut self, stats: &AggregateStats) -> Result<(), PrefsError>;
}

/// Preferences kept in a JSON object on disk, one entry per key
#[derive(Debug, Clone)]
pub struct FilePreferenceCache {
    path: PathBuf,
}

impl FilePreferenceCache {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        let Ok(bytes) = fs::read(&self.path) else {
            return Map::new();
        };
        match serde_json::from_slice::<Map<String, Value>>(&bytes) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "preference file is malformed, ignoring it");
                Map::new()
            }
        }
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read_map().remove(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "cached preference is malformed, using default");
                None
            }
        }
    }

    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PrefsError> {
        let mut map = self.read_map();
        map.insert(key.to_string(), serde_json::to_value(value)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PrefsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let data = serde_json::to_vec_pretty(&map)?;
        fs::write(&self.path, data).map_err(|source| PrefsError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(key, path = %self.path.display(), "preference saved");
        Ok(())
    }
}

impl PreferenceCache for FilePreferenceCache {
    fn identity(&self) -> Option<Identity> {
        let identity: Identity = self.read_key(IDENTITY_KEY)?;
        match identity.validate() {
            Ok(()) => Some(identity),
            Err(reason) => {
                warn!(reason, "cached identity is invalid, ignoring it");
                None
            }
        }
    }

    fn set_identity(&mut self, identity: &Identity) -> Result<(), PrefsError> {
        self.write_key(IDENTITY_KEY, identity)
    }

    fn aggregate_stats(&self) -> AggregateStats {
        self.read_key(STATS_KEY).unwrap_or_default()
    }

    fn set_aggregate_stats(&mut self, stats: &AggregateStats) -> Result<(), PrefsError> {
        self.write_key(STATS_KEY, stats)
    }
}

/// Process-local preferences, lost on exit
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceCache {
    identity: Option<Identity>,
    stats: Option<AggregateStats>,
}

impl MemoryPreferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            stats: None,
        }
    }
}

impl PreferenceCache for MemoryPreferenceCache {
    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    fn set_identity(&mut self, identity: &Identity) -> Result<(), PrefsError> {
        self.identity = Some(identity.clone());
        Ok(())
    }

    fn aggregate_stats(&self) -> AggregateStats {
        self.stats.unwrap_or_default()
    }

    fn set_aggregate_stats(&mut self, stats: &AggregateStats) -> Result<(), PrefsError> {
        self.stats = Some(*stats);
        Ok(())
    }
}
