//! services/exam_runner/src/config.rs
//!
//! Defines the runner's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub exam_file: PathBuf,
    pub exam_id: Uuid,
    pub submissions_file: PathBuf,
    pub learner_id: Option<Uuid>,
    pub tick_period: Duration,
    pub submit_timeout: Duration,
    pub duration_override_secs: Option<u64>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Exam source and submission output ---
        let exam_file = lookup("EXAM_FILE")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingVar("EXAM_FILE".to_string()))?;

        let exam_id_str =
            lookup("EXAM_ID").ok_or_else(|| ConfigError::MissingVar("EXAM_ID".to_string()))?;
        let exam_id = parse_uuid("EXAM_ID", &exam_id_str)?;

        let submissions_file = lookup("SUBMISSIONS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./submissions.jsonl"));

        let learner_id = lookup("LEARNER_ID")
            .map(|value| parse_uuid("LEARNER_ID", &value))
            .transpose()?;

        // --- Session timing ---
        let tick_millis = parse_u64(&lookup, "TICK_MILLIS")?.unwrap_or(1000);
        if tick_millis == 0 {
            return Err(ConfigError::InvalidValue(
                "TICK_MILLIS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let submit_timeout_secs = parse_u64(&lookup, "SUBMIT_TIMEOUT_SECS")?.unwrap_or(30);
        let duration_override_secs = parse_u64(&lookup, "EXAM_DURATION_SECS")?;

        // --- Logging ---
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            exam_file,
            exam_id,
            submissions_file,
            learner_id,
            tick_period: Duration::from_millis(tick_millis),
            submit_timeout: Duration::from_secs(submit_timeout_secs),
            duration_override_secs,
            log_level,
        })
    }
}

fn parse_uuid(key: &str, value: &str) -> Result<Uuid, ConfigError> {
    value
        .trim()
        .parse::<Uuid>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const EXAM_ID: &str = "7b1e3a52-4c1d-4a8e-9f3b-2d6c5e8a9b10";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config =
            Config::from_lookup(lookup(&[("EXAM_FILE", "exams.json"), ("EXAM_ID", EXAM_ID)]))
                .unwrap();

        assert_eq!(config.exam_file, PathBuf::from("exams.json"));
        assert_eq!(config.exam_id.to_string(), EXAM_ID);
        assert_eq!(config.submissions_file, PathBuf::from("./submissions.jsonl"));
        assert_eq!(config.learner_id, None);
        assert_eq!(config.tick_period, Duration::from_secs(1));
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
        assert_eq!(config.duration_override_secs, None);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("EXAM_FILE", "exams.json"),
            ("EXAM_ID", EXAM_ID),
            ("TICK_MILLIS", "250"),
            ("SUBMIT_TIMEOUT_SECS", "5"),
            ("EXAM_DURATION_SECS", "90"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.tick_period, Duration::from_millis(250));
        assert_eq!(config.submit_timeout, Duration::from_secs(5));
        assert_eq!(config.duration_override_secs, Some(90));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn missing_exam_file_is_reported() {
        let err = Config::from_lookup(lookup(&[("EXAM_ID", EXAM_ID)])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "EXAM_FILE"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("EXAM_FILE", "exams.json"),
            ("EXAM_ID", "not-a-uuid"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "EXAM_ID"));

        let err = Config::from_lookup(lookup(&[
            ("EXAM_FILE", "exams.json"),
            ("EXAM_ID", EXAM_ID),
            ("TICK_MILLIS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "TICK_MILLIS"));

        let err = Config::from_lookup(lookup(&[
            ("EXAM_FILE", "exams.json"),
            ("EXAM_ID", EXAM_ID),
            ("RUST_LOG", "loud"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RUST_LOG"));
    }
}
