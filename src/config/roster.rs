//! Agent roster loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GameSimError, Result};

/// Model used when the roster leaves `model` blank or absent.
pub const DEFAULT_MODEL: &str = "gpt-4";

const REQUIRED_COLUMNS: [&str; 3] = ["strategy_name", "system_prompt", "frequency"];

/// One roster row: a strategy and how many agents play it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Strategy name, used as the agent id prefix.
    pub strategy_name: String,
    /// System prompt describing the strategy.
    pub system_prompt: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Number of agents built from this row (at least 1).
    pub frequency: u32,
}

impl AgentSpec {
    /// Spec with the default model and frequency 1.
    pub fn new(strategy_name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            system_prompt: system_prompt.into(),
            model: DEFAULT_MODEL.to_string(),
            frequency: 1,
        }
    }

    /// Set the replica count.
    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    strategy_name: String,
    system_prompt: String,
    #[serde(default)]
    model: Option<String>,
    frequency: String,
}

/// Load the agent roster from a CSV file with columns `strategy_name`,
/// `system_prompt`, `frequency` and optionally `model`.
pub fn load_agents(path: impl AsRef<Path>) -> Result<Vec<AgentSpec>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        GameSimError::Config(format!(
            "Agent configuration file not found: {} ({e})",
            path.display()
        ))
    })?;
    let specs = read_agents(file, &path.display().to_string())?;
    info!(
        "Loaded {} agent configurations from {}",
        specs.len(),
        path.display()
    );
    Ok(specs)
}

/// Parse a roster from any reader. `source` names the input in errors.
pub(crate) fn read_agents(reader: impl std::io::Read, source: &str) -> Result<Vec<AgentSpec>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(GameSimError::MissingColumns {
            file: source.to_string(),
            columns: missing.join(", "),
        });
    }

    let mut specs = Vec::new();
    for row in rdr.deserialize::<RosterRow>() {
        let row = row?;
        if row.strategy_name.is_empty() {
            return Err(GameSimError::invalid_value(
                "strategy_name",
                "",
                format!("empty strategy name in {source}"),
            ));
        }
        let frequency = row.frequency.parse::<i64>().map_err(|_| {
            GameSimError::invalid_value(
                format!("frequency ({})", row.strategy_name),
                &row.frequency,
                "expected an integer",
            )
        })?;
        if frequency < 1 {
            return Err(GameSimError::invalid_value(
                format!("frequency ({})", row.strategy_name),
                &row.frequency,
                "must be at least 1",
            ));
        }
        let model = row
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        specs.push(AgentSpec {
            strategy_name: row.strategy_name,
            system_prompt: row.system_prompt,
            model,
            frequency: u32::try_from(frequency).unwrap_or(u32::MAX),
        });
    }

    if specs.is_empty() {
        return Err(GameSimError::Config(format!("{source} defines no agents")));
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_roster() {
        let csv = "strategy_name,system_prompt,model,frequency\n\
                   Tit-for-Tat,\"Mirror, then forgive.\",gpt-4o,2\n\
                   Defector,Always defect.,,1\n";
        let specs = read_agents(csv.as_bytes(), "agents.csv").unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].system_prompt, "Mirror, then forgive.");
        assert_eq!(specs[0].model, "gpt-4o");
        assert_eq!(specs[0].frequency, 2);
        assert_eq!(specs[1].model, DEFAULT_MODEL);
    }

    #[test]
    fn test_model_column_is_optional() {
        let csv = "strategy_name,system_prompt,frequency\nA,Be nice,3\n";
        let specs = read_agents(csv.as_bytes(), "agents.csv").unwrap();
        assert_eq!(specs[0], AgentSpec::new("A", "Be nice").with_frequency(3));
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "strategy_name,system_prompt\nA,Be nice\n";
        let err = read_agents(csv.as_bytes(), "agents.csv").unwrap_err();
        assert_eq!(
            err.to_string(),
            "agents.csv is missing required columns: frequency"
        );
    }

    #[test]
    fn test_frequency_must_be_positive() {
        for freq in ["0", "-2", "two"] {
            let csv = format!("strategy_name,system_prompt,frequency\nA,Be nice,{freq}\n");
            let err = read_agents(csv.as_bytes(), "agents.csv").unwrap_err();
            assert!(err.is_config(), "{freq}");
        }
    }

    #[test]
    fn test_empty_roster() {
        let csv = "strategy_name,system_prompt,frequency\n";
        assert!(read_agents(csv.as_bytes(), "agents.csv").is_err());
    }
}
