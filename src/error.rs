//! GameSim error types.
//!
//! # Error Classification
//!
//! - **Configuration**: rejected at load time, before any simulation work
//!   starts. Always fatal and reported with the offending file or parameter.
//! - **Provider**: network, timeout or malformed output from the decision
//!   provider. Absorbed at the [`Agent`](crate::agent::Agent) boundary and
//!   replaced by the call type's safe default; never aborts a pairing.
//! - **Invariant**: an unknown game type reaching payoff lookup. Unreachable
//!   with validated configuration.
//! - **Batch**: a single run failing or timing out. Isolated per run and
//!   surfaced in the batch summary.

use thiserror::Error;

/// GameSim errors.
#[derive(Error, Debug)]
pub enum GameSimError {
    /// Generic configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// A CSV file lacks required columns.
    #[error("{file} is missing required columns: {columns}")]
    MissingColumns {
        /// File that was being loaded.
        file: String,
        /// Comma-separated list of missing columns.
        columns: String,
    },

    /// A configuration value could not be parsed or is out of range.
    #[error("Invalid value for {param}: {value} ({reason})")]
    InvalidValue {
        /// Parameter or column name.
        param: String,
        /// Raw value as found in the input.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A game type name in configuration is not part of the closed set.
    #[error("Invalid game type in configuration: {0}")]
    InvalidGameType(String),

    /// A game type reached payoff lookup without being validated.
    #[error("Unknown game type: {0}")]
    UnknownGameType(String),

    /// The agent pool cannot form a pairing.
    #[error("Agent pool has {0} agent(s); at least 2 are required")]
    InsufficientAgents(usize),

    /// Decision provider call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Decision provider rejected the call with a rate limit.
    #[error("Rate limited on model {model} after {attempts} attempt(s)")]
    RateLimited {
        /// Model that was rate limited.
        model: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// No API key available for a live run.
    #[error("OPENAI_API_KEY is not set; pass --api-key or use --dry-run")]
    ApiKeyMissing,

    /// Batch orchestration error.
    #[error("Batch error: {0}")]
    Batch(String),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for GameSim operations
pub type Result<T> = std::result::Result<T, GameSimError>;

impl GameSimError {
    /// Shorthand for [`GameSimError::InvalidValue`].
    pub fn invalid_value(
        param: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GameSimError::InvalidValue {
            param: param.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to the configuration class.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            GameSimError::Config(_)
                | GameSimError::MissingColumns { .. }
                | GameSimError::InvalidValue { .. }
                | GameSimError::InvalidGameType(_)
                | GameSimError::InsufficientAgents(_)
        )
    }
}

impl From<reqwest::Error> for GameSimError {
    fn from(err: reqwest::Error) -> Self {
        GameSimError::Provider(err.to_string())
    }
}

impl From<toml::de::Error> for GameSimError {
    fn from(err: toml::de::Error) -> Self {
        GameSimError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_classification() {
        assert!(GameSimError::InsufficientAgents(1).is_config());
        assert!(GameSimError::invalid_value("avg_rounds", "0", "must be >= 1").is_config());
        assert!(!GameSimError::Provider("timeout".to_string()).is_config());
        assert!(!GameSimError::UnknownGameType("chess".to_string()).is_config());
    }

    #[test]
    fn test_messages_are_actionable() {
        let err = GameSimError::MissingColumns {
            file: "agents.csv".to_string(),
            columns: "frequency".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "agents.csv is missing required columns: frequency"
        );
    }
}
