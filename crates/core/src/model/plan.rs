use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{LearnerId, PlanId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudyPlanError {
    #[error("study plan must contain at least one topic")]
    Empty,

    #[error("topic name cannot be empty (position {position})")]
    EmptyTopicName { position: u32 },

    #[error("topic {topic} belongs to plan {found}, expected {expected}")]
    ForeignTopic {
        topic: TopicId,
        expected: PlanId,
        found: PlanId,
    },

    #[error("duplicate topic id {0}")]
    DuplicateTopic(TopicId),

    #[error("topic positions must be 1..={len} without gaps, found {position}")]
    InvalidPosition { position: u32, len: usize },
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// A single topic of a study plan.
///
/// Name and description are produced by the content side and treated as
/// opaque text here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    id: TopicId,
    plan_id: PlanId,
    position: u32,
    name: String,
    description: String,
}

impl Topic {
    /// Rehydrate a topic from storage.
    ///
    /// # Errors
    ///
    /// Returns `StudyPlanError::EmptyTopicName` for a blank name and
    /// `StudyPlanError::InvalidPosition` for position 0.
    pub fn from_persisted(
        id: TopicId,
        plan_id: PlanId,
        position: u32,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, StudyPlanError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StudyPlanError::EmptyTopicName { position });
        }
        if position == 0 {
            return Err(StudyPlanError::InvalidPosition { position, len: 0 });
        }
        Ok(Self {
            id,
            plan_id,
            position,
            name,
            description: description.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> TopicId {
        self.id
    }

    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDraft {
    pub name: String,
    pub description: String,
}

impl TopicDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Unsaved study plan. Storage assigns ids and positions `1..=N` in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyPlanDraft {
    pub learner_id: LearnerId,
    pub topics: Vec<TopicDraft>,
}

impl StudyPlanDraft {
    /// Validate the draft before it is handed to storage.
    ///
    /// # Errors
    ///
    /// Returns `StudyPlanError::Empty` when there are no topics and
    /// `StudyPlanError::EmptyTopicName` for blank names.
    pub fn validate(self) -> Result<Self, StudyPlanError> {
        if self.topics.is_empty() {
            return Err(StudyPlanError::Empty);
        }
        for (idx, topic) in self.topics.iter().enumerate() {
            if topic.name.trim().is_empty() {
                return Err(StudyPlanError::EmptyTopicName {
                    position: u32::try_from(idx + 1).unwrap_or(u32::MAX),
                });
            }
        }
        Ok(self)
    }
}

//
// ─── STUDY PLAN ────────────────────────────────────────────────────────────────
//

/// Ordered, immutable list of topics owned by one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlan {
    id: PlanId,
    learner_id: LearnerId,
    topics: Vec<Topic>,
    created_at: DateTime<Utc>,
}

impl StudyPlan {
    /// Assemble a plan from persisted topics, in any order.
    ///
    /// # Errors
    ///
    /// Fails unless the topics are non-empty, all belong to `id`, have unique
    /// ids, and their positions are exactly `1..=N`.
    pub fn from_persisted(
        id: PlanId,
        learner_id: LearnerId,
        mut topics: Vec<Topic>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StudyPlanError> {
        if topics.is_empty() {
            return Err(StudyPlanError::Empty);
        }

        topics.sort_by_key(Topic::position);

        let len = topics.len();
        let mut seen = HashSet::with_capacity(len);
        for (idx, topic) in topics.iter().enumerate() {
            if topic.plan_id != id {
                return Err(StudyPlanError::ForeignTopic {
                    topic: topic.id,
                    expected: id,
                    found: topic.plan_id,
                });
            }
            if !seen.insert(topic.id) {
                return Err(StudyPlanError::DuplicateTopic(topic.id));
            }
            if usize::try_from(topic.position).ok() != Some(idx + 1) {
                return Err(StudyPlanError::InvalidPosition {
                    position: topic.position,
                    len,
                });
            }
        }

        Ok(Self {
            id,
            learner_id,
            topics,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> PlanId {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Topics in plan order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Topic> {
        self.topics.first()
    }

    #[must_use]
    pub fn contains(&self, topic: TopicId) -> bool {
        self.index_of(topic).is_some()
    }

    #[must_use]
    pub fn topic(&self, topic: TopicId) -> Option<&Topic> {
        self.index_of(topic).map(|idx| &self.topics[idx])
    }

    /// Topic following `topic`, `None` at the end or if `topic` is not in the plan.
    #[must_use]
    pub fn next_after(&self, topic: TopicId) -> Option<&Topic> {
        self.index_of(topic).and_then(|idx| self.topics.get(idx + 1))
    }

    /// Topic preceding `topic`, `None` at the start or if `topic` is not in the plan.
    #[must_use]
    pub fn previous_before(&self, topic: TopicId) -> Option<&Topic> {
        self.index_of(topic)
            .and_then(|idx| idx.checked_sub(1))
            .map(|idx| &self.topics[idx])
    }

    fn index_of(&self, topic: TopicId) -> Option<usize> {
        self.topics.iter().position(|t| t.id == topic)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn topic(id: u64, plan: u64, position: u32) -> Topic {
        Topic::from_persisted(
            TopicId::new(id),
            PlanId::new(plan),
            position,
            format!("Topic {id}"),
            "",
        )
        .unwrap()
    }

    fn plan(ids: &[u64]) -> StudyPlan {
        let topics = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| topic(*id, 1, u32::try_from(idx + 1).unwrap()))
            .collect();
        StudyPlan::from_persisted(PlanId::new(1), LearnerId::new(9), topics, fixed_now()).unwrap()
    }

    #[test]
    fn orders_topics_by_position() {
        let topics = vec![topic(30, 1, 3), topic(10, 1, 1), topic(20, 1, 2)];
        let plan =
            StudyPlan::from_persisted(PlanId::new(1), LearnerId::new(9), topics, fixed_now())
                .unwrap();
        let ids: Vec<_> = plan.topics().iter().map(|t| t.id().value()).collect();
        assert_eq!(ids, [10, 20, 30]);
    }

    #[test]
    fn next_and_previous_stop_at_boundaries() {
        let plan = plan(&[10, 20, 30]);
        assert_eq!(plan.next_after(TopicId::new(10)).map(Topic::id), Some(TopicId::new(20)));
        assert_eq!(plan.next_after(TopicId::new(30)), None);
        assert_eq!(plan.previous_before(TopicId::new(10)), None);
        assert_eq!(
            plan.previous_before(TopicId::new(30)).map(Topic::id),
            Some(TopicId::new(20))
        );
        assert_eq!(plan.next_after(TopicId::new(99)), None);
    }

    #[test]
    fn rejects_gaps_and_duplicates() {
        let gap = vec![topic(1, 1, 1), topic(2, 1, 3)];
        assert!(matches!(
            StudyPlan::from_persisted(PlanId::new(1), LearnerId::new(1), gap, fixed_now()),
            Err(StudyPlanError::InvalidPosition { position: 3, len: 2 })
        ));

        let dup_position = vec![topic(1, 1, 1), topic(2, 1, 1)];
        assert!(matches!(
            StudyPlan::from_persisted(PlanId::new(1), LearnerId::new(1), dup_position, fixed_now()),
            Err(StudyPlanError::InvalidPosition { .. })
        ));

        let dup_id = vec![topic(1, 1, 1), topic(1, 1, 2)];
        assert!(matches!(
            StudyPlan::from_persisted(PlanId::new(1), LearnerId::new(1), dup_id, fixed_now()),
            Err(StudyPlanError::DuplicateTopic(_))
        ));
    }

    #[test]
    fn rejects_topics_from_another_plan() {
        let topics = vec![topic(1, 1, 1), topic(2, 2, 2)];
        assert!(matches!(
            StudyPlan::from_persisted(PlanId::new(1), LearnerId::new(1), topics, fixed_now()),
            Err(StudyPlanError::ForeignTopic { .. })
        ));
    }

    #[test]
    fn draft_requires_named_topics() {
        let empty = StudyPlanDraft {
            learner_id: LearnerId::new(1),
            topics: Vec::new(),
        };
        assert_eq!(empty.validate(), Err(StudyPlanError::Empty));

        let blank = StudyPlanDraft {
            learner_id: LearnerId::new(1),
            topics: vec![TopicDraft::new("Alphabet", ""), TopicDraft::new(" ", "")],
        };
        assert_eq!(
            blank.validate(),
            Err(StudyPlanError::EmptyTopicName { position: 2 })
        );
    }
}
