use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tutor_core::model::{
    AttemptRecord, Learner, LearnerId, LearnerStats, MasteryRecord, PlanId, StudyPlan,
    StudyPlanDraft, Topic, TopicId, VocabularyEntry,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A versioned write found a different version than it expected, or a
    /// unique row already exists.
    #[error("conflicting concurrent write")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait LearnerRepository: Send + Sync {
    /// Insert a learner or overwrite its profile.
    ///
    /// The current topic is never written here: a new learner starts without
    /// one and an existing learner keeps theirs. Use `save_current_topic` or
    /// a progression commit to move it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the learner cannot be stored.
    async fn upsert_learner(&self, learner: &Learner) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner does not exist.
    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError>;

    /// Point the learner at `topic`, or clear the pointer with `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner does not exist.
    async fn save_current_topic(
        &self,
        learner: LearnerId,
        topic: Option<TopicId>,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StudyPlanRepository: Send + Sync {
    /// Store a new plan; ids and positions `1..=N` are assigned here.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner does not exist,
    /// `StorageError::Conflict` if they already own a plan, and
    /// `StorageError::Serialization` if the draft is invalid.
    async fn insert_plan(
        &self,
        draft: &StudyPlanDraft,
        created_at: DateTime<Utc>,
    ) -> Result<StudyPlan, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; a learner without a plan is
    /// `Ok(None)`.
    async fn load_plan(&self, learner: LearnerId) -> Result<Option<StudyPlan>, StorageError>;
}

#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; a missing record is `Ok(None)`.
    async fn load_mastery(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<Option<MasteryRecord>, StorageError>;

    /// Write a record if the stored version still equals
    /// `record.expected_version()`. Returns the record with its new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the version check fails.
    async fn save_mastery(&self, record: &MasteryRecord) -> Result<MasteryRecord, StorageError>;

    /// All records of a learner, ordered by topic id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn mastery_for_learner(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<MasteryRecord>, StorageError>;
}

#[async_trait]
pub trait AttemptLogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn recent_attempts(
        &self,
        learner: LearnerId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn learner_stats(&self, learner: LearnerId) -> Result<LearnerStats, StorageError>;
}

#[async_trait]
pub trait VocabularyRepository: Send + Sync {
    /// Insert entries, replacing the translation and tag of words already
    /// present. Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entries cannot be stored.
    async fn insert_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<usize, StorageError>;

    /// Up to `limit` random entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn sample_vocabulary(&self, limit: u32) -> Result<Vec<VocabularyEntry>, StorageError>;
}

/// Everything one scored answer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionCommit {
    /// Updated record; its `expected_version()` guards the write.
    pub record: MasteryRecord,
    pub attempt: AttemptRecord,
    /// New current topic of the learner, when the topic was just completed.
    pub advance_to: Option<TopicId>,
}

#[async_trait]
pub trait ProgressionPersistence: Send + Sync {
    /// Write the mastery record, append the attempt and move the current
    /// topic in a single transaction. Nothing is written on error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the record version changed since
    /// it was loaded, or other storage errors.
    async fn commit_progression(
        &self,
        commit: &ProgressionCommit,
    ) -> Result<MasteryRecord, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    learners: HashMap<LearnerId, Learner>,
    plans: HashMap<LearnerId, StudyPlan>,
    mastery: HashMap<(LearnerId, TopicId), MasteryRecord>,
    attempts: Vec<AttemptRecord>,
    vocabulary: Vec<VocabularyEntry>,
    last_plan_id: u64,
    last_topic_id: u64,
}

/// In-memory repository for tests and prototyping.
///
/// All tables sit behind one lock, so a progression commit is atomic here as
/// well.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn check_version(stored: Option<&MasteryRecord>, expected: u64) -> Result<(), StorageError> {
    let found = stored.map_or(0, MasteryRecord::version);
    if found == expected {
        Ok(())
    } else {
        tracing::debug!(expected, found, "mastery version mismatch");
        Err(StorageError::Conflict)
    }
}

#[async_trait]
impl LearnerRepository for InMemoryRepository {
    async fn upsert_learner(&self, learner: &Learner) -> Result<(), StorageError> {
        let mut state = self.state()?;
        let current = state
            .learners
            .get(&learner.id())
            .and_then(Learner::current_topic);
        let mut stored = learner.clone();
        stored.set_current_topic(current);
        state.learners.insert(learner.id(), stored);
        Ok(())
    }

    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError> {
        let state = self.state()?;
        state.learners.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn save_current_topic(
        &self,
        learner: LearnerId,
        topic: Option<TopicId>,
    ) -> Result<(), StorageError> {
        let mut state = self.state()?;
        let learner = state
            .learners
            .get_mut(&learner)
            .ok_or(StorageError::NotFound)?;
        learner.set_current_topic(topic);
        Ok(())
    }
}

#[async_trait]
impl StudyPlanRepository for InMemoryRepository {
    async fn insert_plan(
        &self,
        draft: &StudyPlanDraft,
        created_at: DateTime<Utc>,
    ) -> Result<StudyPlan, StorageError> {
        let draft = draft
            .clone()
            .validate()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut state = self.state()?;
        if !state.learners.contains_key(&draft.learner_id) {
            return Err(StorageError::NotFound);
        }
        if state.plans.contains_key(&draft.learner_id) {
            return Err(StorageError::Conflict);
        }

        let plan_id = PlanId::new(state.last_plan_id + 1);
        let mut topics = Vec::with_capacity(draft.topics.len());
        let mut topic_id = state.last_topic_id;
        for (position, topic) in (1_u32..).zip(&draft.topics) {
            topic_id += 1;
            topics.push(
                Topic::from_persisted(
                    TopicId::new(topic_id),
                    plan_id,
                    position,
                    topic.name.trim(),
                    topic.description.trim(),
                )
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            );
        }
        let plan = StudyPlan::from_persisted(plan_id, draft.learner_id, topics, created_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        state.last_plan_id = plan_id.value();
        state.last_topic_id = topic_id;
        state.plans.insert(draft.learner_id, plan.clone());
        Ok(plan)
    }

    async fn load_plan(&self, learner: LearnerId) -> Result<Option<StudyPlan>, StorageError> {
        let state = self.state()?;
        Ok(state.plans.get(&learner).cloned())
    }
}

#[async_trait]
impl MasteryRepository for InMemoryRepository {
    async fn load_mastery(
        &self,
        learner: LearnerId,
        topic: TopicId,
    ) -> Result<Option<MasteryRecord>, StorageError> {
        let state = self.state()?;
        Ok(state.mastery.get(&(learner, topic)).cloned())
    }

    async fn save_mastery(&self, record: &MasteryRecord) -> Result<MasteryRecord, StorageError> {
        let mut state = self.state()?;
        let key = (record.learner_id(), record.topic_id());
        check_version(state.mastery.get(&key), record.expected_version())?;

        let mut saved = record.clone();
        saved.mark_saved();
        state.mastery.insert(key, saved.clone());
        Ok(saved)
    }

    async fn mastery_for_learner(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        let state = self.state()?;
        let mut records: Vec<_> = state
            .mastery
            .values()
            .filter(|r| r.learner_id() == learner)
            .cloned()
            .collect();
        records.sort_by_key(MasteryRecord::topic_id);
        Ok(records)
    }
}

#[async_trait]
impl AttemptLogRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError> {
        let mut state = self.state()?;
        state.attempts.push(attempt.clone());
        i64::try_from(state.attempts.len())
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))
    }

    async fn recent_attempts(
        &self,
        learner: LearnerId,
        limit: u32,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let state = self.state()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut recent: Vec<_> = state
            .attempts
            .iter()
            .filter(|a| a.learner_id == learner)
            .cloned()
            .collect();
        // stable sort keeps insertion order for equal timestamps; reverse for newest first
        recent.sort_by_key(|a| a.answered_at);
        recent.reverse();
        recent.truncate(limit);
        Ok(recent)
    }

    async fn learner_stats(&self, learner: LearnerId) -> Result<LearnerStats, StorageError> {
        let state = self.state()?;
        Ok(LearnerStats::from_attempts(
            state.attempts.iter().filter(|a| a.learner_id == learner),
        ))
    }
}

#[async_trait]
impl VocabularyRepository for InMemoryRepository {
    async fn insert_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<usize, StorageError> {
        let mut state = self.state()?;
        for entry in entries {
            match state.vocabulary.iter_mut().find(|e| e.word == entry.word) {
                Some(existing) => *existing = entry.clone(),
                None => state.vocabulary.push(entry.clone()),
            }
        }
        Ok(entries.len())
    }

    async fn sample_vocabulary(&self, limit: u32) -> Result<Vec<VocabularyEntry>, StorageError> {
        let mut pool = self.state()?.vocabulary.clone();
        pool.shuffle(&mut rng());
        pool.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(pool)
    }
}

#[async_trait]
impl ProgressionPersistence for InMemoryRepository {
    async fn commit_progression(
        &self,
        commit: &ProgressionCommit,
    ) -> Result<MasteryRecord, StorageError> {
        let record = &commit.record;
        if commit.attempt.learner_id != record.learner_id()
            || commit.attempt.topic_id != record.topic_id()
        {
            return Err(StorageError::Conflict);
        }

        let mut state = self.state()?;
        let key = (record.learner_id(), record.topic_id());
        check_version(state.mastery.get(&key), record.expected_version())?;
        if commit.advance_to.is_some() && !state.learners.contains_key(&record.learner_id()) {
            return Err(StorageError::NotFound);
        }

        let mut saved = record.clone();
        saved.mark_saved();
        state.mastery.insert(key, saved.clone());
        state.attempts.push(commit.attempt.clone());
        if let (Some(topic), Some(learner)) = (
            commit.advance_to,
            state.learners.get_mut(&record.learner_id()),
        ) {
            learner.set_current_topic(Some(topic));
        }
        Ok(saved)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Repositories behind trait objects so backends can be swapped.
#[derive(Clone)]
pub struct Storage {
    pub learners: Arc<dyn LearnerRepository>,
    pub plans: Arc<dyn StudyPlanRepository>,
    pub mastery: Arc<dyn MasteryRepository>,
    pub attempts: Arc<dyn AttemptLogRepository>,
    pub vocabulary: Arc<dyn VocabularyRepository>,
    pub progression: Arc<dyn ProgressionPersistence>,
}

impl Storage {
    /// Wire every repository to the same backend.
    #[must_use]
    pub fn from_backend<R>(repo: R) -> Self
    where
        R: LearnerRepository
            + StudyPlanRepository
            + MasteryRepository
            + AttemptLogRepository
            + VocabularyRepository
            + ProgressionPersistence
            + Clone
            + 'static,
    {
        Self {
            learners: Arc::new(repo.clone()),
            plans: Arc::new(repo.clone()),
            mastery: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            vocabulary: Arc::new(repo.clone()),
            progression: Arc::new(repo),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::{BloomLevel, Proficiency, TopicDraft};
    use tutor_core::progression::decide;
    use tutor_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, StudyPlan) {
        let repo = InMemoryRepository::new();
        let learner = Learner::new(LearnerId::new(7), Proficiency::Beginner, fixed_now());
        repo.upsert_learner(&learner).await.unwrap();
        let draft = StudyPlanDraft {
            learner_id: learner.id(),
            topics: vec![
                TopicDraft::new("Alphabet", "Letters"),
                TopicDraft::new("Greetings", ""),
            ],
        };
        let plan = repo.insert_plan(&draft, fixed_now()).await.unwrap();
        (repo, plan)
    }

    fn attempt(record: &MasteryRecord, is_correct: bool) -> AttemptRecord {
        AttemptRecord {
            learner_id: record.learner_id(),
            topic_id: record.topic_id(),
            bloom_level: record.bloom_level(),
            question: "q".into(),
            chosen_option: "a".into(),
            correct_option: "a".into(),
            is_correct,
            answered_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn insert_plan_assigns_dense_positions() {
        let (repo, plan) = seeded().await;
        let positions: Vec<_> = plan.topics().iter().map(Topic::position).collect();
        assert_eq!(positions, [1, 2]);

        let loaded = repo.load_plan(LearnerId::new(7)).await.unwrap().unwrap();
        assert_eq!(loaded, plan);
        assert!(repo.load_plan(LearnerId::new(8)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_plan_for_learner_conflicts() {
        let (repo, _) = seeded().await;
        let draft = StudyPlanDraft {
            learner_id: LearnerId::new(7),
            topics: vec![TopicDraft::new("Numbers", "")],
        };
        assert!(matches!(
            repo.insert_plan(&draft, fixed_now()).await,
            Err(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn save_mastery_checks_version() {
        let (repo, plan) = seeded().await;
        let topic = plan.topics()[0].id();
        let fresh = MasteryRecord::new(LearnerId::new(7), topic, fixed_now());

        let saved = repo.save_mastery(&fresh).await.unwrap();
        assert_eq!(saved.version(), 1);

        // stale copy still expects version 0
        assert!(matches!(
            repo.save_mastery(&fresh).await,
            Err(StorageError::Conflict)
        ));

        let again = repo.save_mastery(&saved).await.unwrap();
        assert_eq!(again.version(), 2);
    }

    #[tokio::test]
    async fn conflicting_commit_writes_nothing() {
        let (repo, plan) = seeded().await;
        let topic = plan.topics()[0].id();
        let stored = repo
            .save_mastery(&MasteryRecord::new(LearnerId::new(7), topic, fixed_now()))
            .await
            .unwrap();

        let mut stale = MasteryRecord::new(LearnerId::new(7), topic, fixed_now());
        let decision = decide(BloomLevel::REMEMBER, 0, true, &Default::default());
        stale.apply_decision(&decision, true, fixed_now());
        let commit = ProgressionCommit {
            attempt: attempt(&stale, true),
            record: stale,
            advance_to: Some(plan.topics()[1].id()),
        };

        assert!(matches!(
            repo.commit_progression(&commit).await,
            Err(StorageError::Conflict)
        ));
        let current = repo
            .load_mastery(LearnerId::new(7), topic)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current, stored);
        assert_eq!(
            repo.learner_stats(LearnerId::new(7)).await.unwrap(),
            LearnerStats::default()
        );
        let learner = repo.get_learner(LearnerId::new(7)).await.unwrap();
        assert_eq!(learner.current_topic(), None);
    }

    #[tokio::test]
    async fn commit_writes_record_attempt_and_topic() {
        let (repo, plan) = seeded().await;
        let topic = plan.topics()[0].id();
        let mut record = MasteryRecord::new(LearnerId::new(7), topic, fixed_now());
        let decision = decide(BloomLevel::REMEMBER, 0, false, &Default::default());
        record.apply_decision(&decision, false, fixed_now());

        let commit = ProgressionCommit {
            attempt: attempt(&record, false),
            record,
            advance_to: Some(plan.topics()[1].id()),
        };
        let saved = repo.commit_progression(&commit).await.unwrap();

        assert_eq!(saved.version(), 1);
        assert_eq!(saved.total_attempts(), 1);
        let stats = repo.learner_stats(LearnerId::new(7)).await.unwrap();
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.correct_attempts, 0);
        let learner = repo.get_learner(LearnerId::new(7)).await.unwrap();
        assert_eq!(learner.current_topic(), Some(plan.topics()[1].id()));
    }

    #[tokio::test]
    async fn upsert_learner_never_moves_the_current_topic() {
        let (repo, plan) = seeded().await;
        let id = LearnerId::new(7);
        let second = plan.topics()[1].id();
        repo.save_current_topic(id, Some(second)).await.unwrap();

        let mut profile = Learner::new(id, Proficiency::Advanced, fixed_now());
        profile.set_current_topic(None);
        repo.upsert_learner(&profile).await.unwrap();
        let stored = repo.get_learner(id).await.unwrap();
        assert_eq!(stored.proficiency(), Proficiency::Advanced);
        assert_eq!(stored.current_topic(), Some(second));

        let mut stranger = Learner::new(LearnerId::new(8), Proficiency::Beginner, fixed_now());
        stranger.set_current_topic(Some(second));
        repo.upsert_learner(&stranger).await.unwrap();
        let stored = repo.get_learner(LearnerId::new(8)).await.unwrap();
        assert_eq!(stored.current_topic(), None);
    }

    #[tokio::test]
    async fn vocabulary_sample_respects_limit() {
        let repo = InMemoryRepository::new();
        let entries: Vec<_> = (0..20)
            .map(|i| VocabularyEntry::new(format!("w{i}"), format!("t{i}"), Some("n.")))
            .collect();
        repo.insert_vocabulary(&entries).await.unwrap();
        repo.insert_vocabulary(&[VocabularyEntry::new("w0", "changed", None)])
            .await
            .unwrap();

        let sample = repo.sample_vocabulary(5).await.unwrap();
        assert_eq!(sample.len(), 5);
        let all = repo.sample_vocabulary(100).await.unwrap();
        assert_eq!(all.len(), 20);
        let w0 = all.iter().find(|e| e.word == "w0").unwrap();
        assert_eq!(w0.translation, "changed");
    }
}
