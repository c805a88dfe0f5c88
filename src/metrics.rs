use serde::{Deserialize, Serialize};

/// How typed characters past the end of the prompt are scored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Every character beyond the prompt counts as a miss
    #[default]
    Penalize,
    /// Characters beyond the prompt are ignored for accuracy
    Clamp,
}

/// Live or final scoring of an attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub wpm: u32,
    pub accuracy: u8,
}

/// Number of whitespace separated, non-empty tokens
pub fn word_count(typed: &str) -> usize {
    typed.split_whitespace().count()
}

/// Words per minute, rounded. `None` when no time has elapsed.
pub fn wpm(words: usize, elapsed_secs: u32) -> Option<u32> {
    if elapsed_secs == 0 {
        return None;
    }
    let per_minute = words as f64 / elapsed_secs as f64 * 60.0;
    Some(per_minute.round() as u32)
}

/// Count of positions where the typed character matches the prompt
pub fn correct_chars(typed: &str, prompt: &str) -> usize {
    typed
        .chars()
        .zip(prompt.chars())
        .filter(|(t, p)| t == p)
        .count()
}

/// Percentage of typed characters matching the prompt by position, 0 for empty input
pub fn accuracy(typed: &str, prompt: &str, policy: OverflowPolicy) -> u8 {
    let typed_len = typed.chars().count();
    let scored_len = match policy {
        OverflowPolicy::Penalize => typed_len,
        OverflowPolicy::Clamp => typed_len.min(prompt.chars().count()),
    };
    if scored_len == 0 {
        return 0;
    }

    let correct = correct_chars(typed, prompt);
    let pct = (correct as f64 / scored_len as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Score `typed` against `prompt` after `elapsed_secs`. `None` when no time has elapsed.
pub fn compute(
    typed: &str,
    prompt: &str,
    elapsed_secs: u32,
    policy: OverflowPolicy,
) -> Option<Metrics> {
    let wpm = wpm(word_count(typed), elapsed_secs)?;
    Some(Metrics {
        wpm,
        accuracy: accuracy(typed, prompt, policy),
    })
}
