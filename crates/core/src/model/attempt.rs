use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::BloomLevel;
use crate::model::ids::{LearnerId, TopicId};
use crate::model::quiz::AnswerOutcome;

/// One scored answer, kept as append-only history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub bloom_level: BloomLevel,
    pub question: String,
    pub chosen_option: String,
    pub correct_option: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl AttemptRecord {
    #[must_use]
    pub fn from_outcome(outcome: &AnswerOutcome, answered_at: DateTime<Utc>) -> Self {
        Self {
            learner_id: outcome.learner_id,
            topic_id: outcome.topic_id,
            bloom_level: outcome.bloom_level,
            question: outcome.question.clone(),
            chosen_option: outcome.chosen_option.clone(),
            correct_option: outcome.correct_option.clone(),
            is_correct: outcome.is_correct,
            answered_at,
        }
    }
}

/// Aggregate over a learner's attempt history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub total_attempts: u32,
    pub correct_attempts: u32,
    /// Distinct UTC calendar days with at least one attempt.
    pub active_days: u32,
}

impl LearnerStats {
    /// Share of correct answers in percent, 0 when nothing was answered yet.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        f64::from(self.correct_attempts) / f64::from(self.total_attempts) * 100.0
    }

    /// Fold attempts into totals. Used by stores without an aggregate query.
    #[must_use]
    pub fn from_attempts<'a>(attempts: impl IntoIterator<Item = &'a AttemptRecord>) -> Self {
        let mut stats = Self::default();
        let mut days = std::collections::BTreeSet::new();
        for attempt in attempts {
            stats.total_attempts = stats.total_attempts.saturating_add(1);
            if attempt.is_correct {
                stats.correct_attempts = stats.correct_attempts.saturating_add(1);
            }
            days.insert(attempt.answered_at.date_naive());
        }
        stats.active_days = u32::try_from(days.len()).unwrap_or(u32::MAX);
        stats
    }
}
