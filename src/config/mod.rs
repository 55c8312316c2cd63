//! Configuration management.
//!
//! Supports configuration from:
//! - Agent roster CSV files (see [`load_agents`])
//! - Experiment parameter CSV files (`parameter,value` rows) or TOML files
//! - Environment variables (provider settings)
//!
//! Everything is validated at load time. A value that cannot be parsed is a
//! fatal [`GameSimError`] naming the file or parameter; only the optional
//! parameters listed on [`ExperimentConfig`] fall back to defaults.

mod roster;
mod template;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GameSimError, Result};
use crate::game::GameType;

pub use roster::{load_agents, AgentSpec, DEFAULT_MODEL};
pub use template::{write_agent_template, write_experiment_template};

/// Default chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Experiment parameters, read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Fixed round count, or the Poisson mean when `rounds_fixed` is false.
    pub avg_rounds: u32,
    /// Whether every pairing plays exactly `avg_rounds` rounds.
    pub rounds_fixed: bool,
    /// Number of pairings in the run.
    pub total_pairings: u32,
    /// Whether agents gossip after each pairing.
    pub allow_gossip: bool,
    /// Character cap for each stored memory.
    pub memory_limit: usize,
    /// Communication turns per round (each turn is A then B).
    pub max_communication_rounds: u32,
    /// Relative weights of the game types.
    pub game_proportions: GameWeights,
    /// When false, one game type is held for all rounds of a pairing.
    pub game_varies_across_pairings: bool,
    /// Whether agents are invited to use private thinking tags.
    pub allow_thinking: bool,
    /// When false, a pairing keeps one scenario per game type.
    pub scenario_varies_across_rounds: bool,
    /// RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            avg_rounds: 5,
            rounds_fixed: true,
            total_pairings: 100,
            allow_gossip: true,
            memory_limit: 500,
            max_communication_rounds: 3,
            game_proportions: GameWeights::uniform(),
            game_varies_across_pairings: true,
            allow_thinking: true,
            scenario_varies_across_rounds: true,
            seed: None,
        }
    }
}

impl ExperimentConfig {
    /// Load from a `.toml` file or a `parameter,value` CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_file(path)
        } else {
            Self::from_csv_file(path)
        }
    }

    /// Load from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GameSimError::Config(format!(
                "Failed to read experiment config {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded experiment configuration from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a CSV file with `parameter` and `value` columns. Extra
    /// columns (such as `description`) are ignored.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            GameSimError::Config(format!(
                "Experiment configuration file not found: {} ({e})",
                path.display()
            ))
        })?;
        let config = Self::from_csv_reader(file, &path.display().to_string())?;
        info!("Loaded experiment configuration from {}", path.display());
        Ok(config)
    }

    /// Parse `parameter,value` CSV from any reader. `source` names the
    /// input in error messages.
    pub fn from_csv_reader(reader: impl std::io::Read, source: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let (param_col, value_col) = match (column("parameter"), column("value")) {
            (Some(p), Some(v)) => (p, v),
            (p, v) => {
                let mut missing = Vec::new();
                if p.is_none() {
                    missing.push("parameter");
                }
                if v.is_none() {
                    missing.push("value");
                }
                return Err(GameSimError::MissingColumns {
                    file: source.to_string(),
                    columns: missing.join(", "),
                });
            },
        };

        let mut config = Self::default();
        let mut seen = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let param = record.get(param_col).unwrap_or("").to_lowercase();
            if param.is_empty() {
                continue;
            }
            let value = record.get(value_col).unwrap_or("");
            config.apply(&param, value)?;
            seen.push(param);
        }

        for key in Self::KEYS {
            if !seen.iter().any(|s| s == key) {
                debug!("Using default value for {key}");
            }
        }

        config.validate()?;
        Ok(config)
    }

    const KEYS: [&'static str; 11] = [
        "avg_rounds",
        "rounds_fixed",
        "total_pairings",
        "allow_gossip",
        "memory_limit",
        "max_communication_rounds",
        "game_proportions",
        "game_varies_across_pairings",
        "allow_thinking",
        "scenario_varies_across_rounds",
        "seed",
    ];

    fn apply(&mut self, param: &str, value: &str) -> Result<()> {
        match param {
            "avg_rounds" => self.avg_rounds = parse_number(param, value)?,
            "rounds_fixed" => self.rounds_fixed = parse_flag(param, value)?,
            "total_pairings" => self.total_pairings = parse_number(param, value)?,
            "allow_gossip" => self.allow_gossip = parse_flag(param, value)?,
            "memory_limit" => self.memory_limit = parse_number(param, value)?,
            "max_communication_rounds" => {
                self.max_communication_rounds = parse_number(param, value)?;
            },
            "game_proportions" => self.game_proportions = GameWeights::parse(value)?,
            "game_varies_across_pairings" => {
                self.game_varies_across_pairings = parse_flag(param, value)?;
            },
            "allow_thinking" => self.allow_thinking = parse_flag(param, value)?,
            "scenario_varies_across_rounds" => {
                self.scenario_varies_across_rounds = parse_flag(param, value)?;
            },
            "seed" => {
                self.seed = if value.is_empty() {
                    None
                } else {
                    Some(parse_number(param, value)?)
                };
            },
            other => warn!("Ignoring unknown experiment parameter '{other}'"),
        }
        Ok(())
    }

    /// Check ranges that the type system does not.
    pub fn validate(&self) -> Result<()> {
        if self.avg_rounds < 1 {
            return Err(GameSimError::invalid_value(
                "avg_rounds",
                self.avg_rounds.to_string(),
                "must be at least 1",
            ));
        }
        if self.total_pairings < 1 {
            return Err(GameSimError::invalid_value(
                "total_pairings",
                self.total_pairings.to_string(),
                "must be at least 1",
            ));
        }
        if self.memory_limit < 1 {
            return Err(GameSimError::invalid_value(
                "memory_limit",
                self.memory_limit.to_string(),
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(param: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| GameSimError::invalid_value(param, value, "expected a non-negative integer"))
}

fn parse_flag(param: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "fixed" if param == "rounds_fixed" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        "stochastic" | "poisson" if param == "rounds_fixed" => Ok(false),
        _ => Err(GameSimError::invalid_value(param, value, "expected true or false")),
    }
}

/// Normalized game-type weights.
///
/// Accepts `pd:40,sh:30,hd:20,coord:10` text or a map keyed by game name;
/// games that are not listed get weight zero. Weights are normalized to sum
/// to 1 on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeightsRepr", into = "BTreeMap<String, f64>")]
pub struct GameWeights {
    weights: [f64; 4],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WeightsRepr {
    Text(String),
    Map(BTreeMap<String, f64>),
}

impl TryFrom<WeightsRepr> for GameWeights {
    type Error = GameSimError;

    fn try_from(repr: WeightsRepr) -> Result<Self> {
        match repr {
            WeightsRepr::Text(text) => GameWeights::parse(&text),
            WeightsRepr::Map(map) => {
                let pairs = map
                    .into_iter()
                    .map(|(name, w)| Ok((parse_game_name(&name)?, w)))
                    .collect::<Result<Vec<_>>>()?;
                GameWeights::from_pairs(pairs)
            },
        }
    }
}

impl From<GameWeights> for BTreeMap<String, f64> {
    fn from(weights: GameWeights) -> Self {
        weights
            .iter()
            .map(|(game, w)| (game.as_str().to_string(), w))
            .collect()
    }
}

fn parse_game_name(name: &str) -> Result<GameType> {
    GameType::parse_loose(name).ok_or_else(|| GameSimError::InvalidGameType(name.trim().to_string()))
}

impl GameWeights {
    /// Equal weight for every game type.
    pub fn uniform() -> Self {
        Self { weights: [0.25; 4] }
    }

    /// All weight on one game type.
    pub fn only(game: GameType) -> Self {
        let mut weights = [0.0; 4];
        weights[Self::slot(game)] = 1.0;
        Self { weights }
    }

    /// Parse `pd:40,sh:30,hd:20,coord:10`. Full game names work too.
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, weight) = part.split_once(':').ok_or_else(|| {
                GameSimError::invalid_value("game_proportions", part, "expected game:weight")
            })?;
            let weight: f64 = weight.trim().parse().map_err(|_| {
                GameSimError::invalid_value("game_proportions", part, "weight is not a number")
            })?;
            pairs.push((parse_game_name(name)?, weight));
        }
        Self::from_pairs(pairs)
    }

    /// Build from `(game, weight)` pairs. Repeated games accumulate.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (GameType, f64)>) -> Result<Self> {
        let mut weights = [0.0; 4];
        for (game, weight) in pairs {
            if !weight.is_finite() || weight < 0.0 {
                return Err(GameSimError::invalid_value(
                    "game_proportions",
                    format!("{}:{weight}", game.abbrev()),
                    "weights must be non-negative",
                ));
            }
            weights[Self::slot(game)] += weight;
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(GameSimError::invalid_value(
                "game_proportions",
                format!("{weights:?}"),
                "at least one weight must be positive",
            ));
        }
        for w in &mut weights {
            *w /= total;
        }
        Ok(Self { weights })
    }

    /// Normalized weight of `game`.
    pub fn weight(&self, game: GameType) -> f64 {
        self.weights[Self::slot(game)]
    }

    /// `(game, weight)` in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (GameType, f64)> + '_ {
        GameType::ALL.into_iter().zip(self.weights.iter().copied())
    }

    fn slot(game: GameType) -> usize {
        GameType::ALL.iter().position(|g| *g == game).unwrap_or(0)
    }
}

impl Default for GameWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Decision provider (chat completions) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Chat completions endpoint.
    pub api_url: String,
    /// Bearer token. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Completion token cap per call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Attempts made on HTTP 429 before giving up.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    pub base_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
            max_tokens: 500,
            temperature: 0.7,
            max_attempts: 3,
            base_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

impl ProviderConfig {
    /// Defaults overridden by `OPENAI_API_KEY`, `GAMESIM_API_URL` and
    /// `GAMESIM_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("GAMESIM_API_URL") {
            config.api_url = url;
        }
        if let Ok(secs) = std::env::var("GAMESIM_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.timeout_secs = secs;
            }
        }

        config
    }

    /// Replace the key when `key` is set.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if key.is_some() {
            self.api_key = key;
        }
        self
    }
}
