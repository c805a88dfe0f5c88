use itertools::Itertools;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::runtime::AppEvent;
use crate::session::SyncStatus;

const CSV_HEADER: [&str; 7] = [
    "name",
    "email",
    "wpm",
    "accuracy",
    "difficulty",
    "duration_secs",
    "completed_at_ms",
];

/// Result of one finished attempt, as stored on the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub name: String,
    pub email: String,
    pub wpm: u32,
    pub accuracy: u8,
    pub difficulty: String,
    pub duration_secs: u32,
    pub completed_at_ms: i64,
}

impl AttemptRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            email: row.get(1)?,
            wpm: row.get(2)?,
            accuracy: row.get(3)?,
            difficulty: row.get(4)?,
            duration_secs: row.get(5)?,
            completed_at_ms: row.get(6)?,
        })
    }

    /// Local date of completion, for display
    pub fn completed_on(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.completed_at_ms)
            .map(|utc| {
                utc.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d")
                    .to_string()
            })
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Shared storage for finished attempts
pub trait ScoreStore: Send + Sync {
    fn save(&self, record: &AttemptRecord) -> Result<(), StoreError>;
    /// Every stored attempt, newest first
    fn list_all(&self) -> Result<Vec<AttemptRecord>, StoreError>;
    /// Attempts recorded under `email`, newest first
    fn list_by_identity(&self, email: &str) -> Result<Vec<AttemptRecord>, StoreError>;
}

/// Score store backed by a SQLite database
#[derive(Debug)]
pub struct SqliteScoreStore {
    conn: Mutex<Connection>,
}

impl SqliteScoreStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened score database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed_at_ms INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scores_email ON scores(email)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scores_completed_at ON scores(completed_at_ms)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query(&self, sql: &str, email: Option<&str>) -> Result<Vec<AttemptRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = match email {
            Some(email) => stmt.query_map([email], AttemptRecord::from_row)?,
            None => stmt.query_map([], AttemptRecord::from_row)?,
        };

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}

impl ScoreStore for SqliteScoreStore {
    fn save(&self, record: &AttemptRecord) -> Result<(), StoreError> {
        if record.accuracy > 100 {
            return Err(StoreError::InvalidRecord(format!(
                "accuracy {} is above 100",
                record.accuracy
            )));
        }

        self.lock()?.execute(
            r#"
            INSERT INTO scores
            (name, email, wpm, accuracy, difficulty, duration_secs, completed_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.name,
                record.email,
                record.wpm,
                record.accuracy,
                record.difficulty,
                record.duration_secs,
                record.completed_at_ms,
            ],
        )?;
        debug!(email = %record.email, wpm = record.wpm, "score saved");
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<AttemptRecord>, StoreError> {
        self.query(
            r#"
            SELECT name, email, wpm, accuracy, difficulty, duration_secs, completed_at_ms
            FROM scores
            ORDER BY completed_at_ms DESC, id DESC
            "#,
            None,
        )
    }

    fn list_by_identity(&self, email: &str) -> Result<Vec<AttemptRecord>, StoreError> {
        self.query(
            r#"
            SELECT name, email, wpm, accuracy, difficulty, duration_secs, completed_at_ms
            FROM scores
            WHERE email = ?1
            ORDER BY completed_at_ms DESC, id DESC
            "#,
            Some(email),
        )
    }
}

/// Which attempts the score table shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreScope {
    Mine(String),
    Everyone,
}

/// A listing that never fails; errors degrade to an empty list with a flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreListing {
    pub records: Vec<AttemptRecord>,
    pub load_failed: bool,
}

impl ScoreListing {
    /// Best wpm per difficulty name, sorted by name
    pub fn best_per_tier(&self) -> Vec<(String, u32)> {
        self.records
            .iter()
            .into_group_map_by(|r| r.difficulty.clone())
            .into_iter()
            .map(|(difficulty, records)| {
                let best = records.iter().map(|r| r.wpm).max().unwrap_or(0);
                (difficulty, best)
            })
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .collect()
    }
}

pub fn load_listing(store: &dyn ScoreStore, scope: &ScoreScope) -> ScoreListing {
    let result = match scope {
        ScoreScope::Mine(email) => store.list_by_identity(email),
        ScoreScope::Everyone => store.list_all(),
    };

    match result {
        Ok(records) => ScoreListing {
            records,
            load_failed: false,
        },
        Err(e) => {
            error!(error = %e, ?scope, "failed to load scores");
            ScoreListing {
                records: Vec::new(),
                load_failed: true,
            }
        }
    }
}

/// Outcome of a save that ran off the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub completed_at_ms: i64,
    pub result: Result<(), String>,
}

impl SaveReport {
    pub fn status(&self) -> SyncStatus {
        match &self.result {
            Ok(()) => SyncStatus::Saved,
            Err(reason) => SyncStatus::Failed(reason.clone()),
        }
    }
}

enum UploadMode {
    Inline,
    Background(Sender<AppEvent>),
}

/// Hands finished attempts to the score store
pub struct ScoreUploader {
    store: Arc<dyn ScoreStore>,
    mode: UploadMode,
}

impl ScoreUploader {
    /// Saves on the calling thread; the status is final on return
    pub fn inline(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            store,
            mode: UploadMode::Inline,
        }
    }

    /// Saves on a spawned thread and reports back with [`AppEvent::Saved`]
    pub fn background(store: Arc<dyn ScoreStore>, events: Sender<AppEvent>) -> Self {
        Self {
            store,
            mode: UploadMode::Background(events),
        }
    }

    pub fn store(&self) -> &Arc<dyn ScoreStore> {
        &self.store
    }

    pub fn submit(&self, record: AttemptRecord) -> SyncStatus {
        match &self.mode {
            UploadMode::Inline => save_and_report(self.store.as_ref(), &record).status(),
            UploadMode::Background(events) => {
                let store = Arc::clone(&self.store);
                let events = events.clone();
                thread::spawn(move || {
                    let report = save_and_report(store.as_ref(), &record);
                    if events.send(AppEvent::Saved(report)).is_err() {
                        debug!("event channel closed before save report was delivered");
                    }
                });
                SyncStatus::Pending
            }
        }
    }
}

fn save_and_report(store: &dyn ScoreStore, record: &AttemptRecord) -> SaveReport {
    let result = store.save(record).map_err(|e| {
        warn!(error = %e, email = %record.email, "failed to save score");
        e.to_string()
    });
    SaveReport {
        completed_at_ms: record.completed_at_ms,
        result,
    }
}

/// Write records as CSV with a header row
pub fn export_csv<W: io::Write>(records: &[AttemptRecord], writer: W) -> Result<(), StoreError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn export_csv_file<P: AsRef<Path>>(
    records: &[AttemptRecord],
    path: P,
) -> Result<(), StoreError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(csv::Error::from)?;
    export_csv(records, file)?;
    info!(path = %path.display(), count = records.len(), "exported scores");
    Ok(())
}
