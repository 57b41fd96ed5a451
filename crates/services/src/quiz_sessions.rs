use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use tutor_core::model::{
    AnswerOutcome, BloomLevel, LearnerId, QuizSession, Submission, SubmitRejection, TopicId,
    ValidatedQuiz,
};

/// Latest session of one learner. An answered session stays in the slot until
/// it is replaced or ended so a duplicate answer can be told apart from a
/// missing session.
type Slot = Option<QuizSession>;

/// In-flight quiz sessions, at most one per learner.
///
/// Each learner has an async lock of its own; the registry lock is only held
/// long enough to look up or create that per-learner lock, never across an
/// await.
///
/// The registry keeps one entry per learner that currently holds a session or
/// an answered one. Answered sessions are not pruned after scoring, since a
/// repeated answer must still report `AlreadyAnswered`, so the registry is
/// bounded by the number of learners rather than by the number of quizzes.
/// Empty slots are dropped by [`QuizSessionManager::end`] and
/// [`QuizSessionManager::release`].
#[derive(Default)]
pub struct QuizSessionManager {
    slots: Mutex<HashMap<LearnerId, Arc<AsyncMutex<Slot>>>>,
}

/// Exclusive access to one learner's session slot.
///
/// Holding the guard serializes every other `start`/`submit`/`end` for the
/// same learner; other learners are unaffected.
pub struct LearnerSessionGuard {
    learner_id: LearnerId,
    slot: OwnedMutexGuard<Slot>,
}

impl LearnerSessionGuard {
    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    /// Replace whatever session the learner had with a fresh one.
    pub fn start(
        &mut self,
        topic_id: TopicId,
        bloom_level: BloomLevel,
        quiz: ValidatedQuiz,
        issued_at: DateTime<Utc>,
    ) -> QuizSession {
        if let Some(previous) = (*self.slot).as_ref().filter(|s| !s.is_answered()) {
            tracing::debug!(
                learner = %self.learner_id,
                session = %previous.id(),
                "discarding unanswered quiz session"
            );
        }
        let session = QuizSession::new(self.learner_id, topic_id, bloom_level, quiz, issued_at);
        *self.slot = Some(session.clone());
        session
    }

    /// Score an answer against the live session, consuming it on success.
    ///
    /// # Errors
    ///
    /// Returns `SubmitRejection::NoSession` when the learner has no session,
    /// otherwise whatever [`QuizSession::answer`] rejects.
    pub fn submit(&mut self, submission: &Submission) -> Result<AnswerOutcome, SubmitRejection> {
        let session = (*self.slot).as_mut().ok_or(SubmitRejection::NoSession)?;
        session.answer(submission)
    }

    pub fn end(&mut self) {
        *self.slot = None;
    }

    /// The unanswered session, if there is one.
    #[must_use]
    pub fn active(&self) -> Option<&QuizSession> {
        (*self.slot).as_ref().filter(|s| !s.is_answered())
    }
}

impl QuizSessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, learner: LearnerId) -> Arc<AsyncMutex<Slot>> {
        // a panic while holding the registry lock cannot leave the map half
        // updated, so a poisoned lock is still usable
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(learner).or_default())
    }

    /// Wait for exclusive access to the learner's session slot.
    pub async fn lock(&self, learner: LearnerId) -> LearnerSessionGuard {
        let slot = self.slot(learner).lock_owned().await;
        LearnerSessionGuard {
            learner_id: learner,
            slot,
        }
    }

    /// Start a new session for `learner`, silently discarding an unanswered one.
    pub async fn start(
        &self,
        learner: LearnerId,
        topic_id: TopicId,
        bloom_level: BloomLevel,
        quiz: ValidatedQuiz,
        issued_at: DateTime<Utc>,
    ) -> QuizSession {
        self.lock(learner)
            .await
            .start(topic_id, bloom_level, quiz, issued_at)
    }

    /// Score an answer. Exactly one of several racing submissions for the
    /// same session succeeds.
    ///
    /// # Errors
    ///
    /// Returns the `SubmitRejection` explaining why the answer was not scored.
    pub async fn submit_answer(
        &self,
        learner: LearnerId,
        submission: &Submission,
    ) -> Result<AnswerOutcome, SubmitRejection> {
        self.lock(learner).await.submit(submission)
    }

    /// Drop the learner's session. Ending twice is harmless.
    pub async fn end(&self, learner: LearnerId) {
        let mut guard = self.lock(learner).await;
        guard.end();
        self.release(guard);
    }

    /// Give up a guard, forgetting the learner if their slot is left empty.
    pub fn release(&self, guard: LearnerSessionGuard) {
        let learner = guard.learner_id;
        drop(guard);
        self.prune(learner);
    }

    /// Snapshot of the learner's unanswered session.
    pub async fn active(&self, learner: LearnerId) -> Option<QuizSession> {
        self.lock(learner).await.active().cloned()
    }

    /// Number of learners with a slot in the registry.
    #[must_use]
    pub fn tracked_learners(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Remove an empty slot nobody else is holding. Handles are only handed
    /// out under the registry lock, so a strong count of one means no other
    /// task can be waiting on it.
    fn prune(&self, learner: LearnerId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let removable = slots.get(&learner).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.is_none())
        });
        if removable {
            slots.remove(&learner);
        }
    }
}
