use include_dir::{include_dir, Dir};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::CorpusError;
use crate::tier::{DifficultyTier, TierId};

static CORPUS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/corpus");

#[derive(Deserialize, Clone, Debug)]
pub struct Corpus {
    pub tier: TierId,
    pub prompts: Vec<String>,
}

impl Corpus {
    /// Load the embedded corpus for a tier
    pub fn load(tier: TierId) -> Result<Self, CorpusError> {
        let file_name = tier.corpus_file();
        let file = CORPUS_DIR
            .get_file(&file_name)
            .ok_or(CorpusError::Missing(tier))?;
        let contents = file.contents_utf8().ok_or(CorpusError::Missing(tier))?;

        let corpus: Corpus =
            serde_json::from_str(contents).map_err(|source| CorpusError::Parse {
                file: file_name,
                source,
            })?;

        if corpus.prompts.is_empty() {
            return Err(CorpusError::Empty(tier));
        }
        Ok(corpus)
    }
}

/// Chooses the prompt text for the next attempt
pub trait PromptPicker {
    fn pick(&mut self, tier: &DifficultyTier) -> String;
}

/// Draws shuffled corpus sentences until the tier's target word count is reached
pub struct RandomPicker {
    corpora: HashMap<TierId, Corpus>,
    rng: StdRng,
}

impl RandomPicker {
    pub fn new() -> Result<Self, CorpusError> {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic picker, for reproducible prompts
    pub fn seeded(seed: u64) -> Result<Self, CorpusError> {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Result<Self, CorpusError> {
        let mut corpora = HashMap::new();
        for tier in [TierId::Beginner, TierId::Intermediate, TierId::Expert] {
            corpora.insert(tier, Corpus::load(tier)?);
        }
        Ok(Self { corpora, rng })
    }
}

impl PromptPicker for RandomPicker {
    fn pick(&mut self, tier: &DifficultyTier) -> String {
        let Some(corpus) = self.corpora.get(&tier.id) else {
            tracing::warn!(tier = %tier.id, "no corpus loaded for tier");
            return String::new();
        };

        let mut sentences: Vec<&String> = Vec::new();
        let mut words = 0;
        // whole shuffled passes: no sentence repeats before every one was used
        while words < tier.target_word_count.max(1) {
            let mut deck: Vec<&String> = corpus.prompts.iter().collect();
            deck.shuffle(&mut self.rng);
            let before = words;
            for sentence in deck {
                words += crate::metrics::word_count(sentence);
                sentences.push(sentence);
                if words >= tier.target_word_count {
                    break;
                }
            }
            if words == before {
                break;
            }
        }

        sentences
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Always hands out the same prompt, whatever the tier
#[derive(Debug, Clone)]
pub struct FixedPicker {
    prompt: String,
}

impl FixedPicker {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl PromptPicker for FixedPicker {
    fn pick(&mut self, _tier: &DifficultyTier) -> String {
        self.prompt.clone()
    }
}
