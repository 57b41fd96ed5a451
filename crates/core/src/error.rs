use thiserror::Error;

use crate::model::{
    BloomLevelError, LearnerError, MasteryRecordError, QuizValidationError, StudyPlanError,
};
use crate::progression::ThresholdError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    BloomLevel(#[from] BloomLevelError),
    #[error(transparent)]
    Threshold(#[from] ThresholdError),
    #[error(transparent)]
    StudyPlan(#[from] StudyPlanError),
    #[error(transparent)]
    Quiz(#[from] QuizValidationError),
    #[error(transparent)]
    Mastery(#[from] MasteryRecordError),
    #[error(transparent)]
    Learner(#[from] LearnerError),
}
