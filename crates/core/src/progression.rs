use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::BloomLevel;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("promotion table needs exactly 5 entries (levels 1-5), got {0}")]
    WrongLength(usize),
    #[error("level {level} requires {provided} correct answers, allowed range is 1..={max}")]
    OutOfBounds { level: u8, provided: u32, max: u32 },
    #[error("invalid promotion table entry {0:?}")]
    Unparsable(String),
}

//
// ─── THRESHOLDS ────────────────────────────────────────────────────────────────
//

/// Consecutive correct answers needed to leave each level for the next one.
///
/// Levels 1 through 5 each have an entry; Create (6) has none because
/// reaching it is itself the completion signal.
///
/// ```
/// # use tutor_core::progression::PromotionThresholds;
/// # use tutor_core::model::BloomLevel;
/// let table = PromotionThresholds::default();
/// assert_eq!(table.required_for(BloomLevel::REMEMBER), Some(5));
/// assert_eq!(table.required_for(BloomLevel::CREATE), None);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct PromotionThresholds([u32; 5]);

impl PromotionThresholds {
    /// Foundational recall needs the most repetition; higher levels confirm faster.
    pub const DEFAULT_TABLE: [u32; 5] = [5, 4, 3, 3, 2];
    pub const MAX_REQUIRED: u32 = 100;

    /// # Errors
    ///
    /// Returns `ThresholdError::OutOfBounds` if any entry is 0 or above `MAX_REQUIRED`.
    pub fn new(table: [u32; 5]) -> Result<Self, ThresholdError> {
        for (idx, required) in table.iter().enumerate() {
            if !(1..=Self::MAX_REQUIRED).contains(required) {
                return Err(ThresholdError::OutOfBounds {
                    level: u8::try_from(idx + 1).unwrap_or(u8::MAX),
                    provided: *required,
                    max: Self::MAX_REQUIRED,
                });
            }
        }
        Ok(Self(table))
    }

    /// # Errors
    ///
    /// Returns `ThresholdError::WrongLength` unless `entries` has 5 items, plus
    /// the bounds errors of [`PromotionThresholds::new`].
    pub fn from_slice(entries: &[u32]) -> Result<Self, ThresholdError> {
        let table: [u32; 5] = entries
            .try_into()
            .map_err(|_| ThresholdError::WrongLength(entries.len()))?;
        Self::new(table)
    }

    /// Required streak for leaving `level`, `None` at Create.
    #[must_use]
    pub fn required_for(&self, level: BloomLevel) -> Option<u32> {
        if level.is_max() {
            return None;
        }
        self.0.get(usize::from(level.value()) - 1).copied()
    }

    #[must_use]
    pub fn as_array(&self) -> [u32; 5] {
        self.0
    }
}

impl Default for PromotionThresholds {
    fn default() -> Self {
        Self(Self::DEFAULT_TABLE)
    }
}

impl TryFrom<Vec<u32>> for PromotionThresholds {
    type Error = ThresholdError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::from_slice(&value)
    }
}

impl From<PromotionThresholds> for Vec<u32> {
    fn from(value: PromotionThresholds) -> Self {
        value.0.to_vec()
    }
}

impl FromStr for PromotionThresholds {
    type Err = ThresholdError;

    /// Parses a comma separated table such as `"5,4,3,3,2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| ThresholdError::Unparsable(part.trim().to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_slice(&entries)
    }
}

impl fmt::Debug for PromotionThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromotionThresholds({self})")
    }
}

impl fmt::Display for PromotionThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e] = self.0;
        write!(f, "{a},{b},{c},{d},{e}")
    }
}

//
// ─── DECISION ──────────────────────────────────────────────────────────────────
//

/// Next mastery state for a topic after one scored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionDecision {
    pub new_level: BloomLevel,
    pub new_streak: u32,
    pub promoted: bool,
    pub completed: bool,
}

/// Pure promotion/demotion rule.
///
/// - A wrong answer demotes one level immediately (floor at Remember) and
///   resets the streak.
/// - A correct answer grows the streak; once it reaches the table entry for
///   the current level the learner moves up one level with a fresh streak.
///   Otherwise the streak is kept so progress survives across sessions.
/// - At Create a correct answer changes nothing except reporting completion.
///
/// ```
/// # use tutor_core::progression::{decide, PromotionThresholds};
/// # use tutor_core::model::BloomLevel;
/// let table = PromotionThresholds::default();
/// let d = decide(BloomLevel::EVALUATE, 1, true, &table);
/// assert_eq!(d.new_level, BloomLevel::CREATE);
/// assert!(d.promoted && d.completed);
/// ```
#[must_use]
pub fn decide(
    current_level: BloomLevel,
    correct_streak: u32,
    is_correct: bool,
    required_for_level: &PromotionThresholds,
) -> ProgressionDecision {
    if !is_correct {
        return ProgressionDecision {
            new_level: current_level.demoted(),
            new_streak: 0,
            promoted: false,
            completed: false,
        };
    }

    let (Some(next_level), Some(required)) = (
        current_level.promoted(),
        required_for_level.required_for(current_level),
    ) else {
        return ProgressionDecision {
            new_level: current_level,
            new_streak: correct_streak,
            promoted: false,
            completed: true,
        };
    };

    let streak = correct_streak.saturating_add(1);
    if streak >= required {
        ProgressionDecision {
            new_level: next_level,
            new_streak: 0,
            promoted: true,
            completed: next_level.is_max(),
        }
    } else {
        ProgressionDecision {
            new_level: current_level,
            new_streak: streak,
            promoted: false,
            completed: false,
        }
    }
}

/// [`decide`] bound to a threshold table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressionPolicy {
    thresholds: PromotionThresholds,
}

impl ProgressionPolicy {
    #[must_use]
    pub fn new(thresholds: PromotionThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &PromotionThresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn decide(
        &self,
        current_level: BloomLevel,
        correct_streak: u32,
        is_correct: bool,
    ) -> ProgressionDecision {
        decide(current_level, correct_streak, is_correct, &self.thresholds)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_answer_demotes_one_level_and_resets_streak() {
        let table = PromotionThresholds::default();
        for level in BloomLevel::all() {
            for streak in [0, 1, 4] {
                let d = decide(level, streak, false, &table);
                assert_eq!(d.new_level.value(), level.value().saturating_sub(1).max(1));
                assert_eq!(d.new_streak, 0);
                assert!(!d.promoted);
                assert!(!d.completed);
            }
        }
    }

    #[test]
    fn promotion_happens_exactly_at_required_streak() {
        let table = PromotionThresholds::default();
        for level in BloomLevel::all().filter(|l| !l.is_max()) {
            let required = table.required_for(level).unwrap();
            let mut current = level;
            let mut streak = 0;
            let mut promotions = 0;

            for answer in 1..=required {
                let d = decide(current, streak, true, &table);
                if answer < required {
                    assert!(!d.promoted, "level {level}: promoted early at {answer}");
                    assert_eq!(d.new_level, level);
                    assert_eq!(d.new_streak, answer);
                } else {
                    assert!(d.promoted);
                    assert_eq!(d.new_streak, 0);
                    promotions += 1;
                }
                current = d.new_level;
                streak = d.new_streak;
            }

            assert_eq!(promotions, 1);
            assert_eq!(current, level.promoted().unwrap());
        }
    }

    #[test]
    fn only_promotion_into_create_completes() {
        let table = PromotionThresholds::default();
        let d = decide(BloomLevel::ANALYZE, 2, true, &table);
        assert!(d.promoted);
        assert!(!d.completed);

        let d = decide(BloomLevel::EVALUATE, 1, true, &table);
        assert_eq!(d.new_level, BloomLevel::CREATE);
        assert!(d.promoted);
        assert!(d.completed);
    }

    #[test]
    fn correct_answer_at_create_is_idempotent() {
        let table = PromotionThresholds::default();
        for streak in [0, 3] {
            let d = decide(BloomLevel::CREATE, streak, true, &table);
            assert_eq!(d.new_level, BloomLevel::CREATE);
            assert_eq!(d.new_streak, streak);
            assert!(!d.promoted);
            assert!(d.completed);
        }
    }

    #[test]
    fn wrong_answer_after_banked_streak_loses_it() {
        let policy = ProgressionPolicy::default();
        let d = policy.decide(BloomLevel::APPLY, 2, false);
        assert_eq!(d.new_level, BloomLevel::UNDERSTAND);
        assert_eq!(d.new_streak, 0);
    }

    #[test]
    fn threshold_table_is_validated() {
        assert_eq!(
            PromotionThresholds::from_slice(&[5, 4, 3]),
            Err(ThresholdError::WrongLength(3))
        );
        assert_eq!(
            PromotionThresholds::new([5, 0, 3, 3, 2]),
            Err(ThresholdError::OutOfBounds {
                level: 2,
                provided: 0,
                max: PromotionThresholds::MAX_REQUIRED
            })
        );
        assert!(PromotionThresholds::new([1, 1, 1, 1, 1]).is_ok());
    }

    #[test]
    fn threshold_table_parses_and_displays() {
        let table: PromotionThresholds = " 6, 5,4 ,3,2".parse().unwrap();
        assert_eq!(table.as_array(), [6, 5, 4, 3, 2]);
        assert_eq!(table.to_string(), "6,5,4,3,2");
        assert!(matches!(
            "5,4,x,3,2".parse::<PromotionThresholds>(),
            Err(ThresholdError::Unparsable(_))
        ));
        assert_eq!(PromotionThresholds::default().to_string(), "5,4,3,3,2");
    }

    #[test]
    fn custom_table_changes_required_streak() {
        let policy = ProgressionPolicy::new(PromotionThresholds::new([1, 1, 1, 1, 1]).unwrap());
        let d = policy.decide(BloomLevel::REMEMBER, 0, true);
        assert!(d.promoted);
        assert_eq!(d.new_level, BloomLevel::UNDERSTAND);
    }
}
