//! Operator-tunable settings
//!
//! Everything a deployment may want to change lives in [`QuizConfig`]. Every
//! field has a default, so an empty TOML document is a valid configuration.

use std::{path::Path, time::Duration};

use enum_map::{EnumMap, enum_map};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{session::*, supplier::*},
    error::ConfigError,
    ids::PlayerId,
    question::Difficulty,
};

/// Highest base score an answer can earn before multipliers
pub const MAX_BASE_POINTS: u64 = 10;

/// Validation result type for duration validation
type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds.
///
/// This is a custom validation function for use with the `garde` crate.
/// It checks if the duration in seconds is within the inclusive range
/// defined by `MIN_SECONDS` and `MAX_SECONDS`.
///
/// # Errors
///
/// Returns a `garde::Error` if the duration is outside the specified bounds.
pub fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
    _ctx: &(),
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Settings for one quiz deployment
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QuizConfig {
    /// Number of rounds in a session
    #[garde(range(min = MIN_ROUNDS, max = MAX_ROUNDS))]
    pub total_rounds: u32,
    /// Time players get to answer each question
    #[garde(custom(validate_duration::<MIN_TIME_LIMIT, MAX_TIME_LIMIT>))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub answer_timeout: Duration,
    /// Pause between a round being graded and the next question
    #[garde(custom(validate_duration::<0, MAX_QUESTION_DELAY>))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub question_delay: Duration,
    /// Nicknames allowed to stop a running quiz
    #[garde(skip)]
    pub admins: Vec<PlayerId>,
    /// Number of rows shown in final results and leaderboards
    #[garde(range(min = 1, max = MAX_STANDINGS))]
    pub standings_limit: usize,
    /// Question supplier settings
    #[garde(dive)]
    pub supplier: SupplierConfig,
    /// Scoring bonuses
    #[garde(dive)]
    pub bonus: BonusRules,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            total_rounds: 10,
            answer_timeout: Duration::from_secs(30),
            question_delay: Duration::from_secs(2),
            admins: Vec::new(),
            standings_limit: 5,
            supplier: SupplierConfig::default(),
            bonus: BonusRules::default(),
        }
    }
}

impl QuizConfig {
    /// Parses and validates a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`QuizConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Whether the player may stop a running quiz
    pub fn is_admin(&self, player: &PlayerId) -> bool {
        self.admins
            .iter()
            .any(|admin| admin.as_str().eq_ignore_ascii_case(player.as_str()))
    }
}

/// Settings for the question supplier's external attempts
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SupplierConfig {
    /// External attempts per question before falling back, zero means fallback only
    #[garde(range(max = MAX_ATTEMPTS))]
    pub max_attempts: u32,
    /// Pause between two failed attempts
    #[garde(custom(validate_duration::<0, MAX_RETRY_DELAY>))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub retry_delay: Duration,
    /// Deadline for a single external request
    #[garde(custom(validate_duration::<MIN_REQUEST_TIMEOUT, MAX_REQUEST_TIMEOUT>))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// One step of a staircase multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct BonusTier {
    /// Smallest value that unlocks this tier
    #[garde(skip)]
    pub threshold: u64,
    /// Multiplier applied when this tier wins
    #[garde(range(min = 1.0, max = 10.0))]
    pub multiplier: f64,
}

impl BonusTier {
    /// Creates a tier
    pub const fn new(threshold: u64, multiplier: f64) -> Self {
        Self {
            threshold,
            multiplier,
        }
    }
}

/// Multiplier tables and base point caps
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BonusRules {
    /// Tiers keyed on the streak a player had before answering
    #[garde(length(max = 16), dive)]
    pub streak: Vec<BonusTier>,
    /// Tiers keyed on whole seconds left on the clock
    #[garde(length(max = 16), dive)]
    pub speed: Vec<BonusTier>,
    /// Largest base score per difficulty, a cap of 10 leaves a tier uncapped
    #[garde(skip)]
    pub base_caps: EnumMap<Difficulty, u64>,
}

impl Default for BonusRules {
    fn default() -> Self {
        Self {
            streak: vec![
                BonusTier::new(3, 1.5),
                BonusTier::new(5, 2.0),
                BonusTier::new(7, 2.5),
            ],
            speed: vec![BonusTier::new(5, 1.5), BonusTier::new(3, 2.0)],
            base_caps: enum_map! {
                Difficulty::Easy => 5,
                Difficulty::Medium => 8,
                Difficulty::Hard => MAX_BASE_POINTS,
            },
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_validate_duration() {
        assert!(validate_duration::<5, 10>(&Duration::from_secs(7), &()).is_ok());
        assert!(validate_duration::<5, 10>(&Duration::from_secs(5), &()).is_ok());
        assert!(validate_duration::<5, 10>(&Duration::from_secs(10), &()).is_ok());
        assert!(validate_duration::<5, 10>(&Duration::from_secs(4), &()).is_err());
        assert!(validate_duration::<5, 10>(&Duration::from_secs(11), &()).is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = QuizConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_rounds, 10);
        assert_eq!(config.answer_timeout, Duration::from_secs(30));
        assert_eq!(config.supplier.max_attempts, 3);
        assert_eq!(config.bonus.base_caps[Difficulty::Medium], 8);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = QuizConfig::from_toml_str("").unwrap();
        assert_eq!(config.total_rounds, 10);
        assert_eq!(config.standings_limit, 5);
        assert_eq!(config.bonus.speed.len(), 2);
    }

    #[test]
    fn test_partial_document() {
        let config = QuizConfig::from_toml_str(
            r#"
            total_rounds = 3
            answer_timeout = 45
            admins = ["Op"]

            [supplier]
            max_attempts = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.total_rounds, 3);
        assert_eq!(config.answer_timeout, Duration::from_secs(45));
        assert_eq!(config.supplier.max_attempts, 0);
        assert_eq!(config.supplier.request_timeout, Duration::from_secs(10));
        assert!(config.is_admin(&PlayerId::from("op")));
        assert!(!config.is_admin(&PlayerId::from("someone")));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(matches!(
            QuizConfig::from_toml_str("total_rounds = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QuizConfig::from_toml_str("answer_timeout = 1"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QuizConfig::from_toml_str("[supplier]\nmax_attempts = 11"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QuizConfig::from_toml_str("[[bonus.speed]]\nthreshold = 5\nmultiplier = 0.5"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            QuizConfig::from_toml_str("total_rounds = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "total_rounds = 7").unwrap();
        writeln!(file, "[bonus.base_caps]").unwrap();
        writeln!(file, "easy = 4").unwrap();
        writeln!(file, "medium = 6").unwrap();
        writeln!(file, "hard = 10").unwrap();

        let config = QuizConfig::load(file.path()).unwrap();
        assert_eq!(config.total_rounds, 7);
        assert_eq!(config.bonus.base_caps[Difficulty::Easy], 4);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            QuizConfig::load(dir.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
