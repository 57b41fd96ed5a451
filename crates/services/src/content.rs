use async_trait::async_trait;
use serde::Serialize;

use tutor_core::model::{BloomLevel, LearnerId, Proficiency, QuizDraft, Topic, VocabularyEntry};

use crate::error::ContentError;

/// Everything a generator needs to write one lesson and question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRequest {
    pub learner_id: LearnerId,
    pub topic_name: String,
    pub topic_description: String,
    pub bloom_level: BloomLevel,
    pub proficiency: Proficiency,
    pub vocabulary_hint: Vec<VocabularyEntry>,
    /// 1 for the first try, higher when earlier content was malformed.
    pub attempt: u32,
}

impl QuestionRequest {
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        topic: &Topic,
        bloom_level: BloomLevel,
        proficiency: Proficiency,
        vocabulary_hint: Vec<VocabularyEntry>,
    ) -> Self {
        Self {
            learner_id,
            topic_name: topic.name().to_owned(),
            topic_description: topic.description().to_owned(),
            bloom_level,
            proficiency,
            vocabulary_hint,
            attempt: 1,
        }
    }
}

/// Source of lessons and quiz questions, usually a language model.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produce unvalidated quiz content for `request`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` when no content could be produced.
    async fn generate_question(&self, request: &QuestionRequest) -> Result<QuizDraft, ContentError>;
}

/// Parse a generator's JSON reply (`lesson`, `question`, `options`,
/// `correct_answer`), tolerating a surrounding Markdown code fence.
///
/// # Errors
///
/// Returns `ContentError::InvalidJson` when the reply is not a quiz object.
pub fn parse_quiz_json(raw: &str) -> Result<QuizDraft, ContentError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(body.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_replies() {
        let plain = r#"{"lesson":"L","question":"Q","options":["a","b"],"correct_answer":"a"}"#;
        let draft = parse_quiz_json(plain).unwrap();
        assert_eq!(draft.correct_option, "a");

        let fenced = format!("```json\n{plain}\n```");
        assert_eq!(parse_quiz_json(&fenced).unwrap(), draft);
    }

    #[test]
    fn rejects_non_quiz_json() {
        assert!(matches!(
            parse_quiz_json(r#"{"lesson":"only"}"#),
            Err(ContentError::InvalidJson(_))
        ));
        assert!(parse_quiz_json("not json").is_err());
    }
}
