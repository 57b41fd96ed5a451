use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BloomLevelError {
    #[error("bloom level must be between 1 and 6, got {0}")]
    OutOfRange(i64),
}

//
// ─── BLOOM LEVEL ──────────────────────────────────────────────────────────────
//

/// Cognitive level of Bloom's taxonomy, used as the difficulty of a topic.
///
/// Levels run from 1 (Remember) to 6 (Create). Reaching level 6 through a
/// promotion marks the topic as mastered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BloomLevel(u8);

impl BloomLevel {
    pub const REMEMBER: Self = Self(1);
    pub const UNDERSTAND: Self = Self(2);
    pub const APPLY: Self = Self(3);
    pub const ANALYZE: Self = Self(4);
    pub const EVALUATE: Self = Self(5);
    pub const CREATE: Self = Self(6);

    pub const MIN: Self = Self::REMEMBER;
    pub const MAX: Self = Self::CREATE;

    /// Validates a raw level.
    ///
    /// # Errors
    ///
    /// Returns `BloomLevelError::OutOfRange` unless `1 <= level <= 6`.
    pub fn new(level: u8) -> Result<Self, BloomLevelError> {
        if (1..=6).contains(&level) {
            Ok(Self(level))
        } else {
            Err(BloomLevelError::OutOfRange(i64::from(level)))
        }
    }

    /// Validates a level read from storage, where integers are signed.
    ///
    /// # Errors
    ///
    /// Returns `BloomLevelError::OutOfRange` unless `1 <= level <= 6`.
    pub fn from_i64(level: i64) -> Result<Self, BloomLevelError> {
        u8::try_from(level)
            .ok()
            .and_then(|v| Self::new(v).ok())
            .ok_or(BloomLevelError::OutOfRange(level))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_max(self) -> bool {
        self == Self::MAX
    }

    /// One level up, or `None` at Create.
    #[must_use]
    pub fn promoted(self) -> Option<Self> {
        (self.0 < 6).then(|| Self(self.0 + 1))
    }

    /// One level down, saturating at Remember.
    #[must_use]
    pub fn demoted(self) -> Self {
        Self(self.0.saturating_sub(1).max(1))
    }

    /// English name of the level.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Remember",
            2 => "Understand",
            3 => "Apply",
            4 => "Analyze",
            5 => "Evaluate",
            _ => "Create",
        }
    }

    /// All six levels in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=6).map(Self)
    }
}

impl Default for BloomLevel {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for BloomLevel {
    type Error = BloomLevelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BloomLevel> for u8 {
    fn from(level: BloomLevel) -> Self {
        level.0
    }
}

impl fmt::Debug for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BloomLevel({} {})", self.0, self.name())
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
