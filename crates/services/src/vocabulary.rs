use std::sync::Arc;

use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;

use storage::repository::{StorageError, VocabularyRepository};
use tutor_core::model::{BloomLevel, PartOfSpeech, Proficiency, VocabularyEntry};

/// Fewer matches than this are topped up from the rest of the pool.
pub const MIN_HINT_WORDS: usize = 5;
/// More matches than this are sampled down.
pub const MAX_HINT_WORDS: usize = 10;

/// Whether `entry` suits a learner of `proficiency` working at `level`.
///
/// Beginners see nouns while remembering and understanding, adjectives while
/// applying and analyzing, and verbs from evaluating on. Intermediate learners
/// see every tagged word, and untagged ones up to Apply. Advanced learners see
/// everything.
#[must_use]
pub fn suits(entry: &VocabularyEntry, proficiency: Proficiency, level: BloomLevel) -> bool {
    match proficiency {
        Proficiency::Beginner => {
            let wanted = if level <= BloomLevel::UNDERSTAND {
                PartOfSpeech::Noun
            } else if level <= BloomLevel::ANALYZE {
                PartOfSpeech::Adjective
            } else {
                PartOfSpeech::Verb
            };
            entry.word_class() == Some(wanted)
        }
        Proficiency::Intermediate => {
            entry.part_of_speech.is_some() || level <= BloomLevel::APPLY
        }
        Proficiency::Advanced => true,
    }
}

/// Filter `pool` for the learner, top it up to [`MIN_HINT_WORDS`] from the
/// remaining words and cap it at [`MAX_HINT_WORDS`] by random sampling.
pub fn select_hint<R: Rng + ?Sized>(
    pool: Vec<VocabularyEntry>,
    proficiency: Proficiency,
    level: BloomLevel,
    rng: &mut R,
) -> Vec<VocabularyEntry> {
    let (mut selected, rest): (Vec<_>, Vec<_>) = pool
        .into_iter()
        .partition(|entry| suits(entry, proficiency, level));

    if selected.len() < MIN_HINT_WORDS {
        let missing = MIN_HINT_WORDS - selected.len();
        selected.extend(rest.into_iter().take(missing));
    }

    if selected.len() > MAX_HINT_WORDS {
        selected.shuffle(rng);
        selected.truncate(MAX_HINT_WORDS);
    }
    selected
}

/// Vocabulary hints for the content generator.
#[derive(Clone)]
pub struct VocabularySelector {
    repo: Arc<dyn VocabularyRepository>,
    pool_size: u32,
}

impl VocabularySelector {
    #[must_use]
    pub fn new(repo: Arc<dyn VocabularyRepository>, pool_size: u32) -> Self {
        Self { repo, pool_size }
    }

    /// Sample the stored vocabulary and pick words for the learner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the vocabulary cannot be read.
    pub async fn hint_for(
        &self,
        proficiency: Proficiency,
        level: BloomLevel,
    ) -> Result<Vec<VocabularyEntry>, StorageError> {
        if self.pool_size == 0 {
            return Ok(Vec::new());
        }
        let pool = self.repo.sample_vocabulary(self.pool_size).await?;
        let hint = select_hint(pool, proficiency, level, &mut rng());
        Ok(hint)
    }
}
