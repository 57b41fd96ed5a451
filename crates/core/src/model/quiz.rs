use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::BloomLevel;
use crate::model::ids::{LearnerId, QuizSessionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Ways generated quiz content can break its contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizValidationError {
    #[error("question text is empty")]
    EmptyQuestion,

    #[error("a quiz needs at least 2 options, got {count}")]
    TooFewOptions { count: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("option {0:?} appears more than once")]
    DuplicateOption(String),

    #[error("correct option {0:?} is not one of the options")]
    CorrectOptionMissing(String),
}

/// Why a submitted answer was not scored.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitRejection {
    #[error("no quiz session for this learner")]
    NoSession,

    #[error("the quiz session was replaced by a newer one")]
    Superseded,

    #[error("the quiz session was already answered")]
    AlreadyAnswered,

    #[error("the chosen option is not part of the quiz")]
    UnknownOption,
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// Quiz content as returned by the content generator, not yet trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDraft {
    #[serde(default)]
    pub lesson: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(alias = "correct_answer")]
    pub correct_option: String,
}

impl QuizDraft {
    /// Check the generator contract: a question, at least two distinct
    /// non-empty options, and a correct option that is one of them.
    ///
    /// Surrounding whitespace is trimmed from every text before comparison.
    ///
    /// # Errors
    ///
    /// Returns the first `QuizValidationError` found.
    pub fn validate(self) -> Result<ValidatedQuiz, QuizValidationError> {
        let question = self.question.trim().to_owned();
        if question.is_empty() {
            return Err(QuizValidationError::EmptyQuestion);
        }

        if self.options.len() < 2 {
            return Err(QuizValidationError::TooFewOptions {
                count: self.options.len(),
            });
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        let mut options = Vec::with_capacity(self.options.len());
        for (index, option) in self.options.into_iter().enumerate() {
            let option = option.trim().to_owned();
            if option.is_empty() {
                return Err(QuizValidationError::EmptyOption { index });
            }
            if !seen.insert(option.clone()) {
                return Err(QuizValidationError::DuplicateOption(option));
            }
            options.push(option);
        }

        let correct = self.correct_option.trim();
        let correct_index = options
            .iter()
            .position(|o| o == correct)
            .ok_or_else(|| QuizValidationError::CorrectOptionMissing(correct.to_owned()))?;

        Ok(ValidatedQuiz {
            lesson: self.lesson.trim().to_owned(),
            question,
            options,
            correct_index,
        })
    }
}

/// Quiz content that satisfies the generator contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedQuiz {
    lesson: String,
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

impl ValidatedQuiz {
    #[must_use]
    pub fn lesson(&self) -> &str {
        &self.lesson
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// The option a learner picked, by button index or by text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChosenOption {
    Index(usize),
    Text(String),
}

/// An answer as it arrives from the front end.
///
/// When `session` is set the answer only applies to that exact session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub session: Option<QuizSessionId>,
    pub choice: ChosenOption,
}

impl Submission {
    #[must_use]
    pub fn text(option: impl Into<String>) -> Self {
        Self {
            session: None,
            choice: ChosenOption::Text(option.into()),
        }
    }

    #[must_use]
    pub fn index(index: usize) -> Self {
        Self {
            session: None,
            choice: ChosenOption::Index(index),
        }
    }

    #[must_use]
    pub fn for_session(mut self, session: QuizSessionId) -> Self {
        self.session = Some(session);
        self
    }
}

impl From<&str> for Submission {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Submission {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Result of scoring one answer against a quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub session_id: QuizSessionId,
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub bloom_level: BloomLevel,
    pub question: String,
    pub chosen_option: String,
    pub correct_option: String,
    pub is_correct: bool,
}

/// A single-use question/answer exchange for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizSession {
    id: QuizSessionId,
    learner_id: LearnerId,
    topic_id: TopicId,
    bloom_level: BloomLevel,
    quiz: ValidatedQuiz,
    answered: bool,
    issued_at: DateTime<Utc>,
}

impl QuizSession {
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        topic_id: TopicId,
        bloom_level: BloomLevel,
        quiz: ValidatedQuiz,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QuizSessionId::generate(),
            learner_id,
            topic_id,
            bloom_level,
            quiz,
            answered: false,
            issued_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuizSessionId {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn bloom_level(&self) -> BloomLevel {
        self.bloom_level
    }

    #[must_use]
    pub fn quiz(&self) -> &ValidatedQuiz {
        &self.quiz
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answered
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    fn resolve(&self, choice: &ChosenOption) -> Option<usize> {
        match choice {
            ChosenOption::Index(idx) => (*idx < self.quiz.options.len()).then_some(*idx),
            ChosenOption::Text(text) => {
                let text = text.trim();
                self.quiz.options.iter().position(|o| o == text)
            }
        }
    }

    /// Score a submission and mark the session answered.
    ///
    /// An unknown option leaves the session open so the learner can pick a
    /// real one.
    ///
    /// # Errors
    ///
    /// Returns `Superseded` when the submission names another session,
    /// `AlreadyAnswered` on a second answer, and `UnknownOption` when the
    /// choice matches no option.
    pub fn answer(&mut self, submission: &Submission) -> Result<AnswerOutcome, SubmitRejection> {
        if submission.session.is_some_and(|id| id != self.id) {
            return Err(SubmitRejection::Superseded);
        }
        if self.answered {
            return Err(SubmitRejection::AlreadyAnswered);
        }
        let chosen = self
            .resolve(&submission.choice)
            .ok_or(SubmitRejection::UnknownOption)?;

        self.answered = true;

        Ok(AnswerOutcome {
            session_id: self.id,
            learner_id: self.learner_id,
            topic_id: self.topic_id,
            bloom_level: self.bloom_level,
            question: self.quiz.question.clone(),
            chosen_option: self.quiz.options[chosen].clone(),
            correct_option: self.quiz.correct_option().to_owned(),
            is_correct: chosen == self.quiz.correct_index,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
