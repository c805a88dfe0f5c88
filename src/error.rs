use std::path::PathBuf;

use crate::tier::TierId;

/// Failures talking to the score store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare score database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("score store connection lock was poisoned")]
    Poisoned,

    #[error("stored record is invalid: {0}")]
    InvalidRecord(String),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures persisting preferences. Reads never fail; they fall back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("failed to write preferences to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("no prompt corpus embedded for tier {0}")]
    Missing(TierId),

    #[error("prompt corpus {file} is not valid json: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("prompt corpus for tier {0} has no prompts")]
    Empty(TierId),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to write config to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Rejected engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("configuration can only change while idle")]
    NotIdle,

    #[error("tier {0} is not offered")]
    UnknownTier(TierId),

    #[error("duration of {0}s is not one of the allowed durations")]
    UnsupportedDuration(u32),

    #[error("invalid identity: {0}")]
    InvalidIdentity(&'static str),

    #[error("failed to store identity: {0}")]
    Persist(String),
}
