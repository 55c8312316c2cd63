//! Business cover stories for the abstract games.
//!
//! A [`Scenario`] dresses a game type up as a plausible situation with two
//! labelled options. The label → canonical move mapping is ground truth and
//! is hidden from anything that only needs the cover story (see
//! [`ScenarioCatalog::export`]).

mod catalog;

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GameSimError, Result};
use crate::game::{GameType, Move};

/// A cover story for one game type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Short title.
    pub name: String,
    /// Game the scenario encodes.
    pub game_type: GameType,
    /// Text shown to agents.
    pub description: String,
    /// Option labels shown to agents.
    pub options: Vec<String>,
    /// Label → canonical move, in declared order. Extraction scans this
    /// order and the first label found wins.
    pub move_mapping: Vec<(String, Move)>,
}

impl Scenario {
    /// Canonical move for an exact label (case-insensitive).
    pub fn move_for_label(&self, label: &str) -> Option<Move> {
        let label = label.trim().to_lowercase();
        self.move_mapping
            .iter()
            .find(|(l, _)| l.to_lowercase() == label)
            .map(|(_, m)| *m)
    }

    /// Public view without the move mapping.
    pub fn view(&self) -> ScenarioView {
        ScenarioView {
            name: self.name.clone(),
            description: self.description.clone(),
            options: self.options.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GameSimError::Config("scenario name is empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(GameSimError::Config(format!(
                "scenario '{}' has no description",
                self.name
            )));
        }
        if self.options.len() < 2 {
            return Err(GameSimError::Config(format!(
                "scenario '{}' needs at least two options",
                self.name
            )));
        }
        for option in &self.options {
            match self.move_for_label(option) {
                Some(mv) if self.game_type.accepts(mv) => {},
                Some(mv) => {
                    return Err(GameSimError::Config(format!(
                        "scenario '{}' maps '{}' to {}, which is not a {} move",
                        self.name, option, mv, self.game_type
                    )))
                },
                None => {
                    return Err(GameSimError::Config(format!(
                        "scenario '{}' has no move mapping for option '{}'",
                        self.name, option
                    )))
                },
            }
        }
        Ok(())
    }
}

/// Scenario as exposed to analysis and external consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioView {
    /// Short title.
    pub name: String,
    /// Text shown to agents.
    pub description: String,
    /// Option labels.
    pub options: Vec<String>,
}

/// Per-game collection of scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    by_game: BTreeMap<GameType, Vec<Scenario>>,
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioCatalog {
    /// Catalog with the built-in business scenarios (three per game type).
    pub fn builtin() -> Self {
        let mut by_game: BTreeMap<GameType, Vec<Scenario>> = BTreeMap::new();
        for scenario in catalog::builtin_scenarios() {
            by_game.entry(scenario.game_type).or_default().push(scenario);
        }
        Self { by_game }
    }

    /// Empty catalog, to be filled with [`ScenarioCatalog::add`].
    pub fn empty() -> Self {
        Self {
            by_game: BTreeMap::new(),
        }
    }

    /// Add a scenario after validating its option mapping.
    pub fn add(&mut self, scenario: Scenario) -> Result<()> {
        scenario.validate()?;
        self.by_game
            .entry(scenario.game_type)
            .or_default()
            .push(scenario);
        Ok(())
    }

    /// Scenarios registered for `game`.
    pub fn scenarios(&self, game: GameType) -> &[Scenario] {
        self.by_game.get(&game).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Uniform random scenario for `game`.
    pub fn pick(&self, game: GameType, rng: &mut impl Rng) -> Result<&Scenario> {
        self.scenarios(game).choose(rng).ok_or_else(|| {
            GameSimError::Config(format!("no scenarios registered for {game}"))
        })
    }

    /// Catalog without move mappings.
    pub fn export(&self) -> BTreeMap<GameType, Vec<ScenarioView>> {
        self.by_game
            .iter()
            .map(|(game, list)| (*game, list.iter().map(Scenario::view).collect()))
            .collect()
    }
}
