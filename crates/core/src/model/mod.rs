mod attempt;
mod bloom;
mod ids;
mod learner;
mod mastery;
mod plan;
mod quiz;
mod vocabulary;

pub use ids::{LearnerId, ParseIdError, PlanId, QuizSessionId, TopicId};

pub use attempt::{AttemptRecord, LearnerStats};
pub use bloom::{BloomLevel, BloomLevelError};
pub use learner::{Learner, LearnerError, Proficiency};
pub use mastery::{MasteryRecord, MasteryRecordError};
pub use plan::{StudyPlan, StudyPlanDraft, StudyPlanError, Topic, TopicDraft};
pub use quiz::{
    AnswerOutcome, ChosenOption, QuizDraft, QuizSession, QuizValidationError, Submission,
    SubmitRejection, ValidatedQuiz,
};
pub use vocabulary::{PartOfSpeech, VocabularyEntry};
