use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Durations (seconds) a test can be configured for
pub const DURATION_OPTIONS: [u32; 6] = [30, 60, 90, 120, 150, 180];

pub const DEFAULT_DURATION_SECS: u32 = 60;

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TierId {
    Beginner,
    Intermediate,
    Expert,
}

impl TierId {
    /// File name of the embedded prompt corpus for this tier
    pub fn corpus_file(&self) -> String {
        format!("{self}.json")
    }
}

/// A named difficulty configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyTier {
    pub id: TierId,
    pub display_name: String,
    pub description: String,
    pub target_word_count: usize,
    pub time_limit_secs: u32,
    pub complexity_rank: u8, // 1 (simple words) to 5 (complex words)
}

impl DifficultyTier {
    fn new(
        id: TierId,
        display_name: &str,
        description: &str,
        target_word_count: usize,
        time_limit_secs: u32,
        complexity_rank: u8,
    ) -> Self {
        Self {
            id,
            display_name: display_name.to_string(),
            description: description.to_string(),
            target_word_count,
            time_limit_secs,
            complexity_rank: complexity_rank.clamp(1, 5),
        }
    }

    /// The built-in tier set, easiest first
    pub fn standard() -> Vec<Self> {
        vec![
            Self::new(
                TierId::Beginner,
                "Beginner",
                "Simple words, plenty of time",
                20,
                60,
                1,
            ),
            Self::new(
                TierId::Intermediate,
                "Intermediate",
                "Mixed vocabulary, moderate pace",
                30,
                60,
                3,
            ),
            Self::new(
                TierId::Expert,
                "Expert",
                "Complex words, challenging pace",
                40,
                60,
                5,
            ),
        ]
    }

    pub fn standard_for(id: TierId) -> Self {
        Self::standard()
            .into_iter()
            .find(|t| t.id == id)
            .unwrap_or_else(|| Self::new(id, "Custom", "", 20, DEFAULT_DURATION_SECS, 1))
    }
}

/// The tiers and durations a session may be configured with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    tiers: Vec<DifficultyTier>,
    durations: Vec<u32>,
}

impl Catalog {
    pub fn new(tiers: Vec<DifficultyTier>, durations: Vec<u32>) -> Self {
        Self { tiers, durations }
    }

    pub fn tiers(&self) -> &[DifficultyTier] {
        &self.tiers
    }

    pub fn durations(&self) -> &[u32] {
        &self.durations
    }

    pub fn tier(&self, id: TierId) -> Option<&DifficultyTier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    pub fn allows_duration(&self, secs: u32) -> bool {
        self.durations.contains(&secs)
    }

    /// Step through the tier list, wrapping at both ends
    pub fn cycle_tier(&self, current: TierId, forward: bool) -> TierId {
        cycle(&self.tiers, |t| t.id == current, forward)
            .map(|t| t.id)
            .unwrap_or(current)
    }

    pub fn cycle_duration(&self, current: u32, forward: bool) -> u32 {
        cycle(&self.durations, |d| *d == current, forward)
            .copied()
            .unwrap_or(current)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DifficultyTier::standard(), DURATION_OPTIONS.to_vec())
    }
}

fn cycle<T>(items: &[T], is_current: impl Fn(&T) -> bool, forward: bool) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    let idx = items.iter().position(is_current).unwrap_or(0);
    let next = if forward {
        (idx + 1) % items.len()
    } else {
        (idx + items.len() - 1) % items.len()
    };
    items.get(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tiers() {
        let tiers = DifficultyTier::standard();

        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0].id, TierId::Beginner);
        assert_eq!(tiers[0].target_word_count, 20);
        assert_eq!(tiers[2].display_name, "Expert");
        assert_eq!(tiers[2].complexity_rank, 5);
    }

    #[test]
    fn test_complexity_rank_in_range() {
        for tier in DifficultyTier::standard() {
            assert!((1..=5).contains(&tier.complexity_rank));
        }
    }

    #[test]
    fn test_tier_id_display() {
        assert_eq!(TierId::Beginner.to_string(), "beginner");
        assert_eq!(TierId::Intermediate.to_string(), "intermediate");
        assert_eq!(TierId::Expert.corpus_file(), "expert.json");
    }

    #[test]
    fn test_tier_id_serde() {
        let json = serde_json::to_string(&TierId::Expert).unwrap();
        assert_eq!(json, "\"expert\"");
        let back: TierId = serde_json::from_str("\"intermediate\"").unwrap();
        assert_eq!(back, TierId::Intermediate);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::default();

        assert!(catalog.tier(TierId::Intermediate).is_some());
        assert!(catalog.allows_duration(90));
        assert!(!catalog.allows_duration(45));
    }

    #[test]
    fn test_catalog_restricted() {
        let catalog = Catalog::new(vec![DifficultyTier::standard_for(TierId::Expert)], vec![30]);

        assert!(catalog.tier(TierId::Beginner).is_none());
        assert!(catalog.tier(TierId::Expert).is_some());
        assert!(!catalog.allows_duration(60));
    }

    #[test]
    fn test_cycle_tier_wraps() {
        let catalog = Catalog::default();

        assert_eq!(
            catalog.cycle_tier(TierId::Beginner, true),
            TierId::Intermediate
        );
        assert_eq!(catalog.cycle_tier(TierId::Expert, true), TierId::Beginner);
        assert_eq!(catalog.cycle_tier(TierId::Beginner, false), TierId::Expert);
    }

    #[test]
    fn test_cycle_duration_wraps() {
        let catalog = Catalog::default();

        assert_eq!(catalog.cycle_duration(60, true), 90);
        assert_eq!(catalog.cycle_duration(180, true), 30);
        assert_eq!(catalog.cycle_duration(30, false), 180);
    }
}
