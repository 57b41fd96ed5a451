use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use storage::repository::{
    AttemptLogRepository, LearnerRepository, MasteryRepository, StudyPlanRepository,
};
use tutor_core::model::{
    AttemptRecord, BloomLevel, LearnerId, LearnerStats, MasteryRecord, PlanId, Topic, TopicId,
};

use crate::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TopicStatus {
    fn of(record: Option<&MasteryRecord>) -> Self {
        match record {
            None => Self::NotStarted,
            Some(r) if r.is_completed() => Self::Completed,
            Some(_) => Self::InProgress,
        }
    }
}

/// One row of a plan overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicProgress {
    pub topic: Topic,
    pub bloom_level: BloomLevel,
    pub correct_streak: u32,
    pub is_completed: bool,
    pub status: TopicStatus,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOverview {
    pub learner_id: LearnerId,
    pub plan_id: PlanId,
    pub topics: Vec<TopicProgress>,
}

impl PlanOverview {
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.topics
            .iter()
            .filter(|t| t.status == TopicStatus::Completed)
            .count()
    }

    #[must_use]
    pub fn current(&self) -> Option<&TopicProgress> {
        self.topics.iter().find(|t| t.is_current)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub learner_id: LearnerId,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    /// Percent of correct answers, 0 without attempts.
    pub accuracy: f64,
    pub active_days: u32,
    /// Newest first.
    pub recent: Vec<AttemptRecord>,
}

/// Read-only views over a learner's progress.
#[derive(Clone)]
pub struct ProgressReportService {
    learners: Arc<dyn LearnerRepository>,
    plans: Arc<dyn StudyPlanRepository>,
    mastery: Arc<dyn MasteryRepository>,
    attempts: Arc<dyn AttemptLogRepository>,
    recent_limit: u32,
}

impl ProgressReportService {
    #[must_use]
    pub fn new(
        learners: Arc<dyn LearnerRepository>,
        plans: Arc<dyn StudyPlanRepository>,
        mastery: Arc<dyn MasteryRepository>,
        attempts: Arc<dyn AttemptLogRepository>,
        recent_limit: u32,
    ) -> Self {
        Self {
            learners,
            plans,
            mastery,
            attempts,
            recent_limit,
        }
    }

    /// Every topic of the learner's plan with its mastery state, in plan order.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::NoStudyPlan` without a plan, `ReportError::Storage`
    /// on backend failure.
    pub async fn plan_overview(&self, learner: LearnerId) -> Result<PlanOverview, ReportError> {
        let plan = self
            .plans
            .load_plan(learner)
            .await?
            .ok_or(ReportError::NoStudyPlan(learner))?;
        let current = self.learners.get_learner(learner).await?.current_topic();
        let records: HashMap<TopicId, MasteryRecord> = self
            .mastery
            .mastery_for_learner(learner)
            .await?
            .into_iter()
            .map(|r| (r.topic_id(), r))
            .collect();

        let topics = plan
            .topics()
            .iter()
            .map(|topic| {
                let record = records.get(&topic.id());
                TopicProgress {
                    topic: topic.clone(),
                    bloom_level: record.map_or(BloomLevel::MIN, MasteryRecord::bloom_level),
                    correct_streak: record.map_or(0, MasteryRecord::correct_streak),
                    is_completed: record.is_some_and(MasteryRecord::is_completed),
                    status: TopicStatus::of(record),
                    is_current: current == Some(topic.id()),
                }
            })
            .collect();

        Ok(PlanOverview {
            learner_id: learner,
            plan_id: plan.id(),
            topics,
        })
    }

    /// Attempt totals and the most recent answers.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Storage` on backend failure.
    pub async fn learner_stats(&self, learner: LearnerId) -> Result<StatsReport, ReportError> {
        let stats: LearnerStats = self.attempts.learner_stats(learner).await?;
        let recent = self
            .attempts
            .recent_attempts(learner, self.recent_limit)
            .await?;
        Ok(StatsReport {
            learner_id: learner,
            total_attempts: stats.total_attempts,
            correct_attempts: stats.correct_attempts,
            accuracy: stats.accuracy(),
            active_days: stats.active_days,
            recent,
        })
    }
}
