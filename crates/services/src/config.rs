use std::env;
use std::str::FromStr;

use tutor_core::progression::PromotionThresholds;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "TUTOR_DB_URL";
pub const THRESHOLDS_VAR: &str = "TUTOR_PROMOTION_THRESHOLDS";
pub const MAX_GENERATION_ATTEMPTS_VAR: &str = "TUTOR_MAX_GENERATION_ATTEMPTS";
pub const VOCABULARY_POOL_VAR: &str = "TUTOR_VOCABULARY_POOL";
pub const RECENT_ATTEMPTS_VAR: &str = "TUTOR_RECENT_ATTEMPTS";

pub const DEFAULT_DB_URL: &str = "sqlite://tutor.sqlite3";

/// Runtime settings of the tutor services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TutorConfig {
    pub db_url: String,
    pub thresholds: PromotionThresholds,
    /// How many times a malformed quiz is regenerated before giving up. At least 1.
    pub max_generation_attempts: u32,
    /// Vocabulary entries sampled from storage before filtering.
    pub vocabulary_pool: u32,
    /// Attempts shown in learner statistics.
    pub recent_attempts: u32,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_owned(),
            thresholds: PromotionThresholds::default(),
            max_generation_attempts: 2,
            vocabulary_pool: 40,
            recent_attempts: 5,
        }
    }
}

impl TutorConfig {
    /// Read `TUTOR_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be used; unset
    /// or blank variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TutorConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unusable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let db_url = get(DB_URL_VAR).unwrap_or(defaults.db_url);

        let thresholds = match get(THRESHOLDS_VAR) {
            Some(raw) => raw.parse().map_err(|source| ConfigError::Thresholds {
                var: THRESHOLDS_VAR,
                source,
            })?,
            None => defaults.thresholds,
        };

        let max_generation_attempts = parse_count(
            MAX_GENERATION_ATTEMPTS_VAR,
            get(MAX_GENERATION_ATTEMPTS_VAR),
            defaults.max_generation_attempts,
            1,
        )?;
        let vocabulary_pool = parse_count(
            VOCABULARY_POOL_VAR,
            get(VOCABULARY_POOL_VAR),
            defaults.vocabulary_pool,
            0,
        )?;
        let recent_attempts = parse_count(
            RECENT_ATTEMPTS_VAR,
            get(RECENT_ATTEMPTS_VAR),
            defaults.recent_attempts,
            0,
        )?;

        Ok(Self {
            db_url,
            thresholds,
            max_generation_attempts,
            vocabulary_pool,
            recent_attempts,
        })
    }
}

fn parse_count(
    var: &'static str,
    raw: Option<String>,
    default: u32,
    min: u32,
) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = u32::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    if value < min {
        return Err(ConfigError::InvalidValue {
            var,
            value: raw,
            reason: format!("must be at least {min}"),
        });
    }
    Ok(value)
}
