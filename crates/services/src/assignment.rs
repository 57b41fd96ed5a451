use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use storage::repository::LearnerRepository;
use tutor_core::model::{
    BloomLevel, LearnerId, QuizSessionId, Topic, ValidatedQuiz, VocabularyEntry,
};
use tutor_core::time::Clock;

use crate::content::{ContentGenerator, QuestionRequest};
use crate::error::{AssignmentError, SequencerError};
use crate::mastery::MasteryService;
use crate::quiz_sessions::QuizSessionManager;
use crate::sequencer::TopicSequencer;
use crate::vocabulary::VocabularySelector;

/// A lesson and question handed to the learner. The correct option stays
/// with the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub session_id: QuizSessionId,
    pub topic: Topic,
    pub bloom_level: BloomLevel,
    pub lesson: String,
    pub question: String,
    pub options: Vec<String>,
    pub vocabulary_hint: Vec<VocabularyEntry>,
}

/// Picks what the learner works on next and opens a quiz session for it.
#[derive(Clone)]
pub struct AssignmentService {
    clock: Clock,
    learners: Arc<dyn LearnerRepository>,
    sequencer: TopicSequencer,
    mastery: MasteryService,
    vocabulary: VocabularySelector,
    generator: Arc<dyn ContentGenerator>,
    sessions: Arc<QuizSessionManager>,
    max_generation_attempts: u32,
}

impl AssignmentService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        learners: Arc<dyn LearnerRepository>,
        sequencer: TopicSequencer,
        mastery: MasteryService,
        vocabulary: VocabularySelector,
        generator: Arc<dyn ContentGenerator>,
        sessions: Arc<QuizSessionManager>,
        max_generation_attempts: u32,
    ) -> Self {
        Self {
            clock,
            learners,
            sequencer,
            mastery,
            vocabulary,
            generator,
            sessions,
            max_generation_attempts: max_generation_attempts.max(1),
        }
    }

    /// Generate a quiz for the learner's current topic at their mastery level
    /// and make it the live session.
    ///
    /// The learner's previous session is discarded as soon as the request
    /// begins, so it cannot be answered even if this request fails. Requests
    /// for the same learner run one at a time.
    ///
    /// # Errors
    ///
    /// - `Sequencer` when the learner or their plan is missing.
    /// - `MalformedContent` when every generated quiz failed validation.
    /// - `Content` when the generator itself failed.
    /// - `Storage` on backend failure.
    #[instrument(skip_all, fields(learner = %learner))]
    pub async fn start_assignment(&self, learner: LearnerId) -> Result<Assignment, AssignmentError> {
        let mut slot = self.sessions.lock(learner).await;
        slot.end();

        let (topic, level, quiz, request) = match self.prepare(learner).await {
            Ok(prepared) => prepared,
            Err(err) => {
                self.sessions.release(slot);
                return Err(err);
            }
        };

        let session = slot.start(topic.id(), level, quiz, self.clock.now());
        drop(slot);
        tracing::info!(
            topic = %topic.id(),
            level = %level,
            session = %session.id(),
            "assignment started"
        );

        let quiz = session.quiz();
        Ok(Assignment {
            session_id: session.id(),
            bloom_level: level,
            lesson: quiz.lesson().to_owned(),
            question: quiz.question().to_owned(),
            options: quiz.options().to_vec(),
            vocabulary_hint: request.vocabulary_hint,
            topic,
        })
    }

    async fn prepare(
        &self,
        learner: LearnerId,
    ) -> Result<(Topic, BloomLevel, ValidatedQuiz, QuestionRequest), AssignmentError> {
        let topic = self.sequencer.current_or_first(learner).await?;
        let profile = self
            .learners
            .get_learner(learner)
            .await
            .map_err(SequencerError::learner_lookup(learner))?;
        let record = self.mastery.get_or_create(learner, topic.id()).await?;
        let level = record.bloom_level();

        let hint = match self.vocabulary.hint_for(profile.proficiency(), level).await {
            Ok(hint) => hint,
            Err(err) => {
                tracing::warn!(error = %err, "vocabulary unavailable; generating without hint");
                Vec::new()
            }
        };

        let mut request =
            QuestionRequest::new(learner, &topic, level, profile.proficiency(), hint);
        let quiz = self.generate_valid(&mut request).await?;
        Ok((topic, level, quiz, request))
    }

    async fn generate_valid(
        &self,
        request: &mut QuestionRequest,
    ) -> Result<ValidatedQuiz, AssignmentError> {
        let mut attempt = 1;
        loop {
            request.attempt = attempt;
            let draft = self.generator.generate_question(request).await?;
            match draft.validate() {
                Ok(quiz) => return Ok(quiz),
                Err(source) if attempt >= self.max_generation_attempts => {
                    tracing::warn!(attempts = attempt, error = %source, "giving up on malformed quiz");
                    return Err(AssignmentError::MalformedContent {
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    tracing::debug!(attempt, error = %source, "regenerating malformed quiz");
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use storage::repository::{InMemoryRepository, StudyPlanRepository, VocabularyRepository};
    use tutor_core::model::{
        Learner, Proficiency, QuizDraft, QuizValidationError, StudyPlanDraft, Submission,
        SubmitRejection, TopicDraft,
    };
    use tutor_core::time::{fixed_clock, fixed_now};

    use crate::error::ContentError;

    /// Hands out prepared drafts in order and records every request.
    struct Scripted {
        drafts: Mutex<Vec<QuizDraft>>,
        seen: Mutex<Vec<QuestionRequest>>,
    }

    impl Scripted {
        fn new(mut drafts: Vec<QuizDraft>) -> Self {
            drafts.reverse();
            Self {
                drafts: Mutex::new(drafts),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContentGenerator for Scripted {
        async fn generate_question(
            &self,
            request: &QuestionRequest,
        ) -> Result<QuizDraft, ContentError> {
            self.seen.lock().unwrap().push(request.clone());
            self.drafts
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ContentError::Generator("script exhausted".into()))
        }
    }

    fn draft(options: &[&str], correct: &str) -> QuizDraft {
        QuizDraft {
            lesson: "Letters".into(),
            question: "Which one?".into(),
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            correct_option: correct.into(),
        }
    }

    async fn service(
        generator: Arc<Scripted>,
        attempts: u32,
    ) -> (AssignmentService, Arc<QuizSessionManager>) {
        let repo = InMemoryRepository::new();
        let learner = Learner::new(LearnerId::new(1), Proficiency::Beginner, fixed_now());
        repo.upsert_learner(&learner).await.unwrap();
        repo.insert_plan(
            &StudyPlanDraft {
                learner_id: learner.id(),
                topics: vec![TopicDraft::new("Alphabet", ""), TopicDraft::new("Nouns", "")],
            },
            fixed_now(),
        )
        .await
        .unwrap();
        repo.insert_vocabulary(&[VocabularyEntry::new("voda", "water", Some("n."))])
            .await
            .unwrap();

        let clock = fixed_clock();
        let sessions = Arc::new(QuizSessionManager::new());
        let svc = AssignmentService::new(
            clock,
            Arc::new(repo.clone()),
            TopicSequencer::new(Arc::new(repo.clone()), Arc::new(repo.clone())),
            MasteryService::new(clock, Arc::new(repo.clone())),
            VocabularySelector::new(Arc::new(repo), 40),
            generator,
            Arc::clone(&sessions),
            attempts,
        );
        (svc, sessions)
    }

    #[tokio::test]
    async fn assignment_opens_session_on_first_topic() {
        let generator = Arc::new(Scripted::new(vec![draft(&["az", "buky"], "az")]));
        let (svc, sessions) = service(Arc::clone(&generator), 2).await;

        let assignment = svc.start_assignment(LearnerId::new(1)).await.unwrap();
        assert_eq!(assignment.topic.name(), "Alphabet");
        assert_eq!(assignment.bloom_level, BloomLevel::REMEMBER);
        assert_eq!(assignment.options, ["az", "buky"]);
        assert_eq!(assignment.vocabulary_hint.len(), 1);

        let live = sessions.active(LearnerId::new(1)).await.unwrap();
        assert_eq!(live.id(), assignment.session_id);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].topic_name, "Alphabet");
        assert_eq!(seen[0].proficiency, Proficiency::Beginner);
    }

    #[tokio::test]
    async fn malformed_quiz_is_regenerated() {
        let generator = Arc::new(Scripted::new(vec![
            draft(&["az", "az"], "az"),
            draft(&["az", "buky"], "buky"),
        ]));
        let (svc, _) = service(Arc::clone(&generator), 2).await;

        let assignment = svc.start_assignment(LearnerId::new(1)).await.unwrap();
        assert_eq!(assignment.options, ["az", "buky"]);
        let attempts: Vec<_> = generator.seen.lock().unwrap().iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, [1, 2]);
    }

    #[tokio::test]
    async fn persistent_malformed_content_opens_no_session() {
        let generator = Arc::new(Scripted::new(vec![
            draft(&["only"], "only"),
            draft(&["a", "b"], "c"),
        ]));
        let (svc, sessions) = service(generator, 2).await;

        let err = svc.start_assignment(LearnerId::new(1)).await.unwrap_err();
        assert!(matches!(
            err,
            AssignmentError::MalformedContent {
                attempts: 2,
                source: QuizValidationError::CorrectOptionMissing(_)
            }
        ));
        assert!(err.is_recoverable());
        assert!(sessions.active(LearnerId::new(1)).await.is_none());
    }

    #[tokio::test]
    async fn failed_request_still_discards_the_previous_session() {
        let generator = Arc::new(Scripted::new(vec![draft(&["az", "buky"], "az")]));
        let (svc, sessions) = service(generator, 1).await;
        let learner = LearnerId::new(1);

        let first = svc.start_assignment(learner).await.unwrap();
        let err = svc.start_assignment(learner).await.unwrap_err();
        assert!(matches!(err, AssignmentError::Content(ContentError::Generator(_))));

        assert!(sessions.active(learner).await.is_none());
        assert_eq!(
            sessions
                .submit_answer(learner, &Submission::text("az"))
                .await,
            Err(SubmitRejection::NoSession)
        );
        assert_eq!(
            sessions
                .submit_answer(learner, &Submission::text("az").for_session(first.session_id))
                .await,
            Err(SubmitRejection::NoSession)
        );
    }

    #[tokio::test]
    async fn unknown_learner_is_not_recoverable() {
        let generator = Arc::new(Scripted::new(Vec::new()));
        let (svc, sessions) = service(generator, 1).await;
        let err = svc.start_assignment(LearnerId::new(9)).await.unwrap_err();
        assert!(matches!(err, AssignmentError::Sequencer(_)));
        assert!(!err.is_recoverable());
        assert_eq!(sessions.tracked_learners(), 0);
    }
}
