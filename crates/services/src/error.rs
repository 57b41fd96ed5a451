//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use tutor_core::model::{
    LearnerId, QuizValidationError, StudyPlanError, SubmitRejection, TopicId,
};
use tutor_core::progression::ThresholdError;

/// Errors emitted by `TopicSequencer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SequencerError {
    #[error("learner {0} is not enrolled")]
    UnknownLearner(LearnerId),
    #[error("learner {0} has no study plan")]
    NoStudyPlan(LearnerId),
    #[error("topic {topic} is not part of the study plan of learner {learner}")]
    InvalidTopicReference { learner: LearnerId, topic: TopicId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SequencerError {
    /// Map a failed learner lookup, turning `NotFound` into `UnknownLearner`.
    pub(crate) fn learner_lookup(learner: LearnerId) -> impl FnOnce(StorageError) -> Self {
        move |err| match err {
            StorageError::NotFound => Self::UnknownLearner(learner),
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `ProgressionOrchestrator::record_answer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    /// There is no live session to answer, or the answer targets a session
    /// that has been replaced.
    #[error("quiz session expired ({0}); request a new assignment")]
    SessionExpired(SubmitRejection),
    /// The session exists but cannot take this answer.
    #[error("answer rejected: {0}")]
    Rejected(SubmitRejection),
    #[error("topic {topic} is not part of the study plan of learner {learner}")]
    InvalidTopicReference { learner: LearnerId, topic: TopicId },
    #[error(transparent)]
    Sequencer(SequencerError),
    /// Writing the result failed. When `session_consumed` is set the answer
    /// cannot be resubmitted; a fresh assignment is the way forward.
    #[error("failed to persist progression (session consumed: {session_consumed})")]
    Persistence {
        #[source]
        source: StorageError,
        session_consumed: bool,
    },
}

impl ProgressionError {
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired(_) | Self::Rejected(_) | Self::Persistence { .. }
        )
    }

    pub(crate) fn after_consume(source: StorageError) -> Self {
        Self::Persistence {
            source,
            session_consumed: true,
        }
    }
}

impl From<SubmitRejection> for ProgressionError {
    fn from(rejection: SubmitRejection) -> Self {
        match rejection {
            SubmitRejection::NoSession | SubmitRejection::Superseded => {
                Self::SessionExpired(rejection)
            }
            SubmitRejection::AlreadyAnswered | SubmitRejection::UnknownOption => {
                Self::Rejected(rejection)
            }
        }
    }
}

impl From<SequencerError> for ProgressionError {
    fn from(err: SequencerError) -> Self {
        match err {
            SequencerError::InvalidTopicReference { learner, topic } => {
                Self::InvalidTopicReference { learner, topic }
            }
            SequencerError::Storage(source) => Self::after_consume(source),
            other => Self::Sequencer(other),
        }
    }
}

/// Errors raised by a `ContentGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error("content generator failed: {0}")]
    Generator(String),
    #[error("content generator returned invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Errors emitted by `AssignmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssignmentError {
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error("generated quiz was malformed after {attempts} attempt(s): {source}")]
    MalformedContent {
        attempts: u32,
        #[source]
        source: QuizValidationError,
    },
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AssignmentError {
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Sequencer(SequencerError::Storage(_))
            | Self::MalformedContent { .. }
            | Self::Content(_)
            | Self::Storage(_) => true,
            Self::Sequencer(_) => false,
        }
    }
}

/// Errors emitted by `ProgressReportService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("learner {0} has no study plan")]
    NoStudyPlan(LearnerId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid `TUTOR_*` configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{var} is invalid: {source}")]
    Thresholds {
        var: &'static str,
        #[source]
        source: ThresholdError,
    },
}

/// Errors emitted while bootstrapping or enrolling through `TutorServices`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    StudyPlan(#[from] StudyPlanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
