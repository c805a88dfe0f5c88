use crate::metrics::{Metrics, OverflowPolicy};
use crate::tier::TierId;
use crate::time_series::WpmSample;
use crate::util::std_dev;

/// Lifecycle of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Showing configuration, no countdown
    Idle,
    /// Countdown active, accepting input
    Running,
    /// Countdown reached zero; waiting for reset
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub tier: TierId,
    pub duration_secs: u32,
    pub overflow: OverflowPolicy,
}

/// State of the attempt in progress. Replaced wholesale on reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub prompt: String,
    pub typed: String,
    pub remaining_secs: u32,
    pub is_running: bool,
    pub live: Metrics,
    pub wpm_samples: Vec<WpmSample>,
}

impl SessionState {
    pub fn new(prompt: String, duration_secs: u32) -> Self {
        Self {
            prompt,
            typed: String::new(),
            remaining_secs: duration_secs,
            is_running: false,
            live: Metrics::default(),
            wpm_samples: Vec::new(),
        }
    }

    pub fn elapsed_secs(&self, duration_secs: u32) -> u32 {
        duration_secs.saturating_sub(self.remaining_secs)
    }

    /// Standard deviation of the per-second wpm samples
    pub fn wpm_spread(&self) -> Option<f64> {
        let values: Vec<f64> = self.wpm_samples.iter().map(|s| s.wpm as f64).collect();
        std_dev(&values)
    }
}

/// What observers see after each countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickUpdate {
    pub remaining_secs: u32,
    pub live_wpm: u32,
    pub live_accuracy: u8,
}

/// Whether the last attempt reached the shared score store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing has been submitted yet
    #[default]
    Idle,
    Pending,
    Saved,
    Failed(String),
    /// Not submitted because no identity was set
    Skipped,
}

impl SyncStatus {
    pub fn label(&self) -> String {
        match self {
            SyncStatus::Idle => String::new(),
            SyncStatus::Pending => "saving to leaderboard...".to_string(),
            SyncStatus::Saved => "saved to leaderboard".to_string(),
            SyncStatus::Failed(reason) => format!("NOT saved to leaderboard: {reason}"),
            SyncStatus::Skipped => "not on leaderboard (no identity set)".to_string(),
        }
    }
}
