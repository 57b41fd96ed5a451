use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, TopicId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearnerError {
    #[error("unknown proficiency: {0}")]
    UnknownProficiency(String),
}

/// Self-assessed language level picked during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proficiency {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Proficiency {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Proficiency::Beginner => "beginner",
            Proficiency::Intermediate => "intermediate",
            Proficiency::Advanced => "advanced",
        }
    }

    /// Parses the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError::UnknownProficiency` for anything else.
    pub fn parse(value: &str) -> Result<Self, LearnerError> {
        match value.trim() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(LearnerError::UnknownProficiency(other.to_owned())),
        }
    }
}

/// A person studying with the bot.
///
/// `current_topic` is a weak reference into the learner's study plan; callers
/// go through the topic sequencer to change it so the reference stays inside
/// the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    id: LearnerId,
    display_name: Option<String>,
    proficiency: Proficiency,
    goal: Option<String>,
    current_topic: Option<TopicId>,
    created_at: DateTime<Utc>,
}

impl Learner {
    #[must_use]
    pub fn new(id: LearnerId, proficiency: Proficiency, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: None,
            proficiency,
            goal: None,
            current_topic: None,
            created_at,
        }
    }

    #[must_use]
    pub fn from_persisted(
        id: LearnerId,
        display_name: Option<String>,
        proficiency: Proficiency,
        goal: Option<String>,
        current_topic: Option<TopicId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            display_name: normalize_optional(display_name),
            proficiency,
            goal: normalize_optional(goal),
            current_topic,
            created_at,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = normalize_optional(Some(name.into()));
        self
    }

    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = normalize_optional(Some(goal.into()));
        self
    }

    #[must_use]
    pub fn id(&self) -> LearnerId {
        self.id
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn proficiency(&self) -> Proficiency {
        self.proficiency
    }

    #[must_use]
    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    #[must_use]
    pub fn current_topic(&self) -> Option<TopicId> {
        self.current_topic
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_current_topic(&mut self, topic: Option<TopicId>) {
        self.current_topic = topic;
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
