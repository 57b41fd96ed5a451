use serde::{Deserialize, Serialize};

/// Word-class tag as stored with vocabulary entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Adjective,
    Verb,
    Other,
}

impl PartOfSpeech {
    /// Reads dictionary-style tags such as `n.`, `adj.` or `v.`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().trim_end_matches('.').to_ascii_lowercase();
        match tag.as_str() {
            "" => None,
            "n" | "noun" => Some(Self::Noun),
            "adj" | "adjective" => Some(Self::Adjective),
            "v" | "verb" => Some(Self::Verb),
            _ => Some(Self::Other),
        }
    }
}

/// A dictionary word offered to the content generator as a hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word: String,
    pub translation: String,
    pub part_of_speech: Option<String>,
}

impl VocabularyEntry {
    #[must_use]
    pub fn new(
        word: impl Into<String>,
        translation: impl Into<String>,
        part_of_speech: Option<&str>,
    ) -> Self {
        Self {
            word: word.into(),
            translation: translation.into(),
            part_of_speech: part_of_speech
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
        }
    }

    #[must_use]
    pub fn word_class(&self) -> Option<PartOfSpeech> {
        self.part_of_speech.as_deref().and_then(PartOfSpeech::from_tag)
    }
}
