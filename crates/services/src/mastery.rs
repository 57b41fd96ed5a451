use std::sync::Arc;

use storage::repository::{MasteryRepository, StorageError};
use tutor_core::model::{LearnerId, MasteryRecord, TopicId};
use tutor_core::time::Clock;

/// Read access to per-topic mastery state, creating records on first use.
#[derive(Clone)]
pub struct MasteryService {
    clock: Clock,
    repo: Arc<dyn MasteryRepository>,
}

impl MasteryService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn MasteryRepository>) -> Self {
        Self { clock, repo }
    }

    /// Stored record, or a fresh unsaved one (level 1, version 0).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    pub async fn load_or_new(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<MasteryRecord, StorageError> {
        Ok(self
            .repo
            .load_mastery(learner, topic)
            .await?
            .unwrap_or_else(|| MasteryRecord::new(learner, topic, self.clock.now())))
    }

    /// Stored record, persisting a fresh one when the learner meets the topic
    /// for the first time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    pub async fn get_or_create(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<MasteryRecord, StorageError> {
        let record = self.load_or_new(learner, topic).await?;
        if record.is_persisted() {
            return Ok(record);
        }
        match self.repo.save_mastery(&record).await {
            Ok(saved) => {
                tracing::debug!(learner = %learner, topic = %topic, "created mastery record");
                Ok(saved)
            }
            // somebody else created it first
            Err(StorageError::Conflict) => self
                .repo
                .load_mastery(learner, topic)
                .await?
                .ok_or(StorageError::NotFound),
            Err(other) => Err(other),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    pub async fn for_learner(&self, learner: LearnerId) -> Result<Vec<MasteryRecord>, StorageError> {
        self.repo.mastery_for_learner(learner).await
    }
}
