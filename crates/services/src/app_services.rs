use std::sync::Arc;

use tracing::instrument;

use storage::repository::{Storage, StorageError};
use tutor_core::model::{Learner, StudyPlan, StudyPlanDraft};
use tutor_core::progression::ProgressionPolicy;

use crate::Clock;
use crate::assignment::AssignmentService;
use crate::config::TutorConfig;
use crate::content::ContentGenerator;
use crate::error::TutorServicesError;
use crate::mastery::MasteryService;
use crate::progression::ProgressionOrchestrator;
use crate::quiz_sessions::QuizSessionManager;
use crate::reports::ProgressReportService;
use crate::sequencer::TopicSequencer;
use crate::vocabulary::VocabularySelector;

/// Assembles the tutor-facing services over one storage backend.
#[derive(Clone)]
pub struct TutorServices {
    clock: Clock,
    storage: Storage,
    sessions: Arc<QuizSessionManager>,
    sequencer: Arc<TopicSequencer>,
    mastery: Arc<MasteryService>,
    assignments: Arc<AssignmentService>,
    progression: Arc<ProgressionOrchestrator>,
    reports: Arc<ProgressReportService>,
}

impl TutorServices {
    /// Wire the services over an existing storage aggregate.
    #[must_use]
    pub fn new(
        storage: Storage,
        config: &TutorConfig,
        clock: Clock,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        let sessions = Arc::new(QuizSessionManager::new());
        let sequencer = TopicSequencer::new(
            Arc::clone(&storage.learners),
            Arc::clone(&storage.plans),
        );
        let mastery = MasteryService::new(clock, Arc::clone(&storage.mastery));
        let vocabulary =
            VocabularySelector::new(Arc::clone(&storage.vocabulary), config.vocabulary_pool);

        let assignments = Arc::new(AssignmentService::new(
            clock,
            Arc::clone(&storage.learners),
            sequencer.clone(),
            mastery.clone(),
            vocabulary,
            generator,
            Arc::clone(&sessions),
            config.max_generation_attempts,
        ));
        let progression = Arc::new(ProgressionOrchestrator::new(
            clock,
            ProgressionPolicy::new(config.thresholds),
            Arc::clone(&sessions),
            mastery.clone(),
            sequencer.clone(),
            Arc::clone(&storage.progression),
        ));
        let reports = Arc::new(ProgressReportService::new(
            Arc::clone(&storage.learners),
            Arc::clone(&storage.plans),
            Arc::clone(&storage.mastery),
            Arc::clone(&storage.attempts),
            config.recent_attempts,
        ));

        Self {
            clock,
            storage,
            sessions,
            sequencer: Arc::new(sequencer),
            mastery: Arc::new(mastery),
            assignments,
            progression,
            reports,
        }
    }

    /// Build services backed by `SQLite` storage at `config.db_url`.
    ///
    /// # Errors
    ///
    /// Returns `TutorServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        config: &TutorConfig,
        clock: Clock,
        generator: Arc<dyn ContentGenerator>,
    ) -> Result<Self, TutorServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::new(storage, config, clock, generator))
    }

    /// Register a learner together with their study plan.
    ///
    /// The learner is created or updated; the plan must be the learner's
    /// first and is always filed under `learner`. Nothing is written when
    /// the learner already has a plan.
    ///
    /// # Errors
    ///
    /// Returns `TutorServicesError::StudyPlan` for an invalid plan and
    /// `TutorServicesError::Storage` (`Conflict` when a plan already exists)
    /// on write failure.
    #[instrument(skip_all, fields(learner = %learner.id()))]
    pub async fn enroll(
        &self,
        learner: &Learner,
        mut plan: StudyPlanDraft,
    ) -> Result<StudyPlan, TutorServicesError> {
        plan.learner_id = learner.id();
        let draft = plan.validate()?;
        if self.storage.plans.load_plan(learner.id()).await?.is_some() {
            tracing::warn!("learner already has a study plan");
            return Err(StorageError::Conflict.into());
        }
        self.storage.learners.upsert_learner(learner).await?;
        let plan = self
            .storage
            .plans
            .insert_plan(&draft, self.clock.now())
            .await?;
        tracing::info!(plan = %plan.id(), topics = plan.len(), "learner enrolled");
        Ok(plan)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<QuizSessionManager> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn sequencer(&self) -> Arc<TopicSequencer> {
        Arc::clone(&self.sequencer)
    }

    #[must_use]
    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }

    #[must_use]
    pub fn assignments(&self) -> Arc<AssignmentService> {
        Arc::clone(&self.assignments)
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionOrchestrator> {
        Arc::clone(&self.progression)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ProgressReportService> {
        Arc::clone(&self.reports)
    }
}
