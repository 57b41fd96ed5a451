use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use storage::repository::{ProgressionCommit, ProgressionPersistence};
use tutor_core::model::{
    AttemptRecord, BloomLevel, LearnerId, MasteryRecord, QuizSessionId, Submission, Topic, TopicId,
};
use tutor_core::progression::ProgressionPolicy;
use tutor_core::time::Clock;

use crate::error::ProgressionError;
use crate::mastery::MasteryService;
use crate::quiz_sessions::QuizSessionManager;
use crate::sequencer::TopicSequencer;

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// What one scored answer did to the learner's mastery of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionResult {
    pub session_id: QuizSessionId,
    pub topic_id: TopicId,
    pub is_correct: bool,
    pub chosen_option: String,
    pub correct_option: String,
    pub old_level: BloomLevel,
    pub new_level: BloomLevel,
    pub correct_streak: u32,
    /// Streak needed to leave `new_level`; `None` at Create.
    pub required_streak: Option<u32>,
    pub promoted: bool,
    pub completed: bool,
    /// Set when this answer completed the topic and a next topic exists.
    pub advanced_to: Option<Topic>,
    /// Record as stored after this answer.
    pub mastery: MasteryRecord,
}

impl ProgressionResult {
    #[must_use]
    pub fn demoted(&self) -> bool {
        self.new_level < self.old_level
    }
}

//
// ─── ORCHESTRATOR ──────────────────────────────────────────────────────────────
//

/// Turns a quiz answer into a mastery update.
///
/// Per learner the whole exchange runs under the session lock: consume the
/// session, load the record, apply the policy, and commit record, attempt and
/// (on completion) the next current topic in one transaction.
#[derive(Clone)]
pub struct ProgressionOrchestrator {
    clock: Clock,
    policy: ProgressionPolicy,
    sessions: Arc<QuizSessionManager>,
    mastery: MasteryService,
    sequencer: TopicSequencer,
    persistence: Arc<dyn ProgressionPersistence>,
}

impl ProgressionOrchestrator {
    #[must_use]
    pub fn new(
        clock: Clock,
        policy: ProgressionPolicy,
        sessions: Arc<QuizSessionManager>,
        mastery: MasteryService,
        sequencer: TopicSequencer,
        persistence: Arc<dyn ProgressionPersistence>,
    ) -> Self {
        Self {
            clock,
            policy,
            sessions,
            mastery,
            sequencer,
            persistence,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &ProgressionPolicy {
        &self.policy
    }

    /// Score `submission` against the learner's live quiz session and update
    /// their mastery.
    ///
    /// # Errors
    ///
    /// - `SessionExpired` when there is no session or the answer targets a
    ///   replaced one; `Rejected` when it was already answered or the option
    ///   is unknown. Mastery is untouched in both cases.
    /// - `Persistence { session_consumed: true }` when the store fails after
    ///   the session was consumed; the learner needs a new assignment.
    /// - `InvalidTopicReference` when the session's topic left the plan.
    #[instrument(skip_all, fields(learner = %learner))]
    pub async fn record_answer(
        &self,
        learner: LearnerId,
        submission: impl Into<Submission>,
    ) -> Result<ProgressionResult, ProgressionError> {
        let submission = submission.into();
        let mut session = self.sessions.lock(learner).await;

        let outcome = session.submit(&submission).map_err(|rejection| {
            tracing::debug!(%rejection, "answer not scored");
            ProgressionError::from(rejection)
        })?;

        let record = self
            .mastery
            .load_or_new(learner, outcome.topic_id)
            .await
            .map_err(ProgressionError::after_consume)?;
        let old_level = record.bloom_level();
        let was_completed = record.is_completed();

        let decision = self
            .policy
            .decide(old_level, record.correct_streak(), outcome.is_correct);

        let now = self.clock.now();
        let mut updated = record;
        updated.apply_decision(&decision, outcome.is_correct, now);

        let advanced_to = if decision.completed && !was_completed {
            self.sequencer.next(learner, outcome.topic_id).await?
        } else {
            None
        };

        let commit = ProgressionCommit {
            record: updated,
            attempt: AttemptRecord::from_outcome(&outcome, now),
            advance_to: advanced_to.as_ref().map(Topic::id),
        };
        let saved = self
            .persistence
            .commit_progression(&commit)
            .await
            .map_err(|source| {
                tracing::warn!(
                    topic = %outcome.topic_id,
                    error = %source,
                    "progression not persisted; session already consumed"
                );
                ProgressionError::after_consume(source)
            })?;
        drop(session);

        if decision.promoted {
            tracing::info!(
                topic = %outcome.topic_id,
                from = %old_level,
                to = %decision.new_level,
                "promoted"
            );
        }
        if let Some(next) = &advanced_to {
            tracing::info!(topic = %outcome.topic_id, next = %next.id(), "topic completed");
        }

        Ok(ProgressionResult {
            session_id: outcome.session_id,
            topic_id: outcome.topic_id,
            is_correct: outcome.is_correct,
            chosen_option: outcome.chosen_option,
            correct_option: outcome.correct_option,
            old_level,
            new_level: decision.new_level,
            correct_streak: decision.new_streak,
            required_streak: self.policy.thresholds().required_for(decision.new_level),
            promoted: decision.promoted,
            completed: decision.completed,
            advanced_to,
            mastery: saved,
        })
    }
}
