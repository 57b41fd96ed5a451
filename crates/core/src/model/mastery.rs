use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::BloomLevel;
use crate::model::ids::{LearnerId, TopicId};
use crate::progression::ProgressionDecision;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MasteryRecordError {
    #[error("correct attempts ({correct}) exceed total attempts ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("a completed topic must be at level 6, found {0}")]
    CompletedBelowCreate(BloomLevel),
}

/// Progress of one learner on one topic.
///
/// `version` is the optimistic concurrency token: 0 means the record has
/// never been stored, and every successful save bumps it by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryRecord {
    learner_id: LearnerId,
    topic_id: TopicId,
    bloom_level: BloomLevel,
    correct_streak: u32,
    is_completed: bool,
    total_attempts: u32,
    correct_attempts: u32,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl MasteryRecord {
    /// Fresh record for a topic the learner has just been shown.
    #[must_use]
    pub fn new(learner_id: LearnerId, topic_id: TopicId, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            topic_id,
            bloom_level: BloomLevel::MIN,
            correct_streak: 0,
            is_completed: false,
            total_attempts: 0,
            correct_attempts: 0,
            version: 0,
            updated_at: now,
        }
    }

    /// Rehydrate a record from storage.
    ///
    /// # Errors
    ///
    /// Returns `MasteryRecordError` when the counters or completion flag are
    /// inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        learner_id: LearnerId,
        topic_id: TopicId,
        bloom_level: BloomLevel,
        correct_streak: u32,
        is_completed: bool,
        total_attempts: u32,
        correct_attempts: u32,
        version: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, MasteryRecordError> {
        if correct_attempts > total_attempts {
            return Err(MasteryRecordError::CountMismatch {
                correct: correct_attempts,
                total: total_attempts,
            });
        }
        if is_completed && !bloom_level.is_max() {
            return Err(MasteryRecordError::CompletedBelowCreate(bloom_level));
        }
        Ok(Self {
            learner_id,
            topic_id,
            bloom_level,
            correct_streak,
            is_completed,
            total_attempts,
            correct_attempts,
            version,
            updated_at,
        })
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn bloom_level(&self) -> BloomLevel {
        self.bloom_level
    }

    #[must_use]
    pub fn correct_streak(&self) -> u32 {
        self.correct_streak
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    #[must_use]
    pub fn correct_attempts(&self) -> u32 {
        self.correct_attempts
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True once the record has been written at least once.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Apply a scored answer. Counters move on every call; level, streak and
    /// completion come straight from the decision.
    pub fn apply_decision(
        &mut self,
        decision: &ProgressionDecision,
        is_correct: bool,
        now: DateTime<Utc>,
    ) {
        self.total_attempts = self.total_attempts.saturating_add(1);
        if is_correct {
            self.correct_attempts = self.correct_attempts.saturating_add(1);
        }
        self.bloom_level = decision.new_level;
        self.correct_streak = decision.new_streak;
        self.is_completed = decision.completed;
        self.updated_at = now;
    }

    /// Version a store should find before overwriting this record.
    #[must_use]
    pub fn expected_version(&self) -> u64 {
        self.version
    }

    /// Mark the record as written by a store.
    pub fn mark_saved(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}
