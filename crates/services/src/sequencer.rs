use std::sync::Arc;

use tracing::instrument;

use storage::repository::{LearnerRepository, StudyPlanRepository};
use tutor_core::model::{LearnerId, StudyPlan, Topic, TopicId};

use crate::error::SequencerError;

/// Walks a learner through their study plan in position order.
#[derive(Clone)]
pub struct TopicSequencer {
    learners: Arc<dyn LearnerRepository>,
    plans: Arc<dyn StudyPlanRepository>,
}

impl TopicSequencer {
    #[must_use]
    pub fn new(learners: Arc<dyn LearnerRepository>, plans: Arc<dyn StudyPlanRepository>) -> Self {
        Self { learners, plans }
    }

    async fn plan(&self, learner: LearnerId) -> Result<StudyPlan, SequencerError> {
        self.plans
            .load_plan(learner)
            .await?
            .ok_or(SequencerError::NoStudyPlan(learner))
    }

    fn require_in_plan(
        plan: &StudyPlan,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<(), SequencerError> {
        if plan.contains(topic) {
            Ok(())
        } else {
            Err(SequencerError::InvalidTopicReference { learner, topic })
        }
    }

    async fn current_in(
        &self,
        plan: &StudyPlan,
        learner: LearnerId,
    ) -> Result<Option<Topic>, SequencerError> {
        let record = self
            .learners
            .get_learner(learner)
            .await
            .map_err(SequencerError::learner_lookup(learner))?;

        let Some(topic_id) = record.current_topic() else {
            return Ok(None);
        };
        match plan.topic(topic_id) {
            Some(topic) => Ok(Some(topic.clone())),
            None => {
                tracing::warn!(
                    learner = %learner,
                    topic = %topic_id,
                    plan = %plan.id(),
                    "current topic points outside the learner's plan"
                );
                Err(SequencerError::InvalidTopicReference {
                    learner,
                    topic: topic_id,
                })
            }
        }
    }

    /// The learner's current topic, `None` when none is set yet.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NoStudyPlan` without a plan and
    /// `SequencerError::InvalidTopicReference` when the stored pointer is not
    /// part of the plan.
    pub async fn current(&self, learner: LearnerId) -> Result<Option<Topic>, SequencerError> {
        let plan = self.plan(learner).await?;
        self.current_in(&plan, learner).await
    }

    /// Topic after `topic` in the learner's plan, `None` after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidTopicReference` if `topic` is not in the plan.
    pub async fn next(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<Option<Topic>, SequencerError> {
        let plan = self.plan(learner).await?;
        Self::require_in_plan(&plan, learner, topic)?;
        Ok(plan.next_after(topic).cloned())
    }

    /// Topic before `topic` in the learner's plan, `None` before the first one.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidTopicReference` if `topic` is not in the plan.
    pub async fn previous(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<Option<Topic>, SequencerError> {
        let plan = self.plan(learner).await?;
        Self::require_in_plan(&plan, learner, topic)?;
        Ok(plan.previous_before(topic).cloned())
    }

    /// Make `topic` the learner's current topic.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::InvalidTopicReference` without writing anything
    /// if `topic` is not in the learner's plan.
    #[instrument(skip_all, fields(learner = %learner, topic = %topic))]
    pub async fn set_current(&self, learner: LearnerId, topic: TopicId) -> Result<(), SequencerError> {
        let plan = self.plan(learner).await?;
        Self::require_in_plan(&plan, learner, topic)?;
        self.learners
            .save_current_topic(learner, Some(topic))
            .await
            .map_err(SequencerError::learner_lookup(learner))
    }

    /// The current topic, falling back to (and storing) the first topic of the
    /// plan when none is set.
    ///
    /// # Errors
    ///
    /// Same as [`TopicSequencer::current`].
    pub async fn current_or_first(&self, learner: LearnerId) -> Result<Topic, SequencerError> {
        let plan = self.plan(learner).await?;
        if let Some(topic) = self.current_in(&plan, learner).await? {
            return Ok(topic);
        }
        let first = plan.first().cloned().ok_or(SequencerError::NoStudyPlan(learner))?;
        self.learners
            .save_current_topic(learner, Some(first.id()))
            .await
            .map_err(SequencerError::learner_lookup(learner))?;
        tracing::info!(learner = %learner, topic = %first.id(), "starting with first topic");
        Ok(first)
    }

    /// Move the current topic forward by one. At the end of the plan nothing
    /// changes and `None` is returned.
    ///
    /// # Errors
    ///
    /// Same as [`TopicSequencer::current`].
    #[instrument(skip_all, fields(learner = %learner))]
    pub async fn advance(&self, learner: LearnerId) -> Result<Option<Topic>, SequencerError> {
        self.step(learner, StudyPlan::next_after).await
    }

    /// Move the current topic back by one. At the start of the plan nothing
    /// changes and `None` is returned.
    ///
    /// # Errors
    ///
    /// Same as [`TopicSequencer::current`].
    #[instrument(skip_all, fields(learner = %learner))]
    pub async fn retreat(&self, learner: LearnerId) -> Result<Option<Topic>, SequencerError> {
        self.step(learner, StudyPlan::previous_before).await
    }

    async fn step(
        &self,
        learner: LearnerId,
        neighbour: fn(&StudyPlan, TopicId) -> Option<&Topic>,
    ) -> Result<Option<Topic>, SequencerError> {
        let current = self.current_or_first(learner).await?;
        let plan = self.plan(learner).await?;
        let Some(target) = neighbour(&plan, current.id()).cloned() else {
            return Ok(None);
        };
        self.learners
            .save_current_topic(learner, Some(target.id()))
            .await
            .map_err(SequencerError::learner_lookup(learner))?;
        Ok(Some(target))
    }
}
