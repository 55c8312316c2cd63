//! Game types, canonical moves and keyword rules.
//!
//! The set of games is closed: prisoner's dilemma, stag hunt, hawk-dove and
//! pure coordination. Each has exactly two canonical moves, and every move
//! that is stored or scored is one of them.
//!
//! Free-text normalization is expressed as ordered [`KeywordRule`] tables
//! rather than inline conditionals, so adding a keyword or a game is a data
//! change.

mod payoff;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GameSimError, Result};

pub use payoff::PayoffCalculator;

/// Abstract game played in a round.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Prisoner's dilemma: cooperate / defect.
    PrisonersDilemma,
    /// Stag hunt: stag / hare.
    StagHunt,
    /// Hawk-dove (chicken): hawk / dove.
    HawkDove,
    /// Pure coordination: option_a / option_b.
    Coordination,
}

impl GameType {
    /// Every game type, in enumeration order.
    pub const ALL: [GameType; 4] = [
        GameType::PrisonersDilemma,
        GameType::StagHunt,
        GameType::HawkDove,
        GameType::Coordination,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::PrisonersDilemma => "prisoners_dilemma",
            GameType::StagHunt => "stag_hunt",
            GameType::HawkDove => "hawk_dove",
            GameType::Coordination => "coordination",
        }
    }

    /// Short name used in `game_proportions` values.
    pub fn abbrev(&self) -> &'static str {
        match self {
            GameType::PrisonersDilemma => "pd",
            GameType::StagHunt => "sh",
            GameType::HawkDove => "hd",
            GameType::Coordination => "coord",
        }
    }

    /// Canonical move pair. The first entry is the "first" row/column of the
    /// payoff table.
    pub fn moves(&self) -> [Move; 2] {
        match self {
            GameType::PrisonersDilemma => [Move::Cooperate, Move::Defect],
            GameType::StagHunt => [Move::Stag, Move::Hare],
            GameType::HawkDove => [Move::Hawk, Move::Dove],
            GameType::Coordination => [Move::OptionA, Move::OptionB],
        }
    }

    /// Move used when a decision cannot be read from provider output.
    pub fn safe_default(&self) -> Move {
        match self {
            GameType::PrisonersDilemma => Move::Cooperate,
            GameType::StagHunt => Move::Stag,
            GameType::HawkDove => Move::Dove,
            GameType::Coordination => Move::OptionA,
        }
    }

    /// Index of `mv` in [`GameType::moves`], if it belongs to this game.
    pub fn index_of(&self, mv: Move) -> Option<usize> {
        self.moves().iter().position(|m| *m == mv)
    }

    /// Whether `mv` is canonical for this game.
    pub fn accepts(&self, mv: Move) -> bool {
        self.index_of(mv).is_some()
    }

    /// Parse a full name or an abbreviation (`pd`, `sh`, `hd`, `coord`).
    pub fn parse_loose(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        GameType::ALL
            .into_iter()
            .find(|g| g.as_str() == s || g.abbrev() == s)
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = GameSimError;

    fn from_str(s: &str) -> Result<Self> {
        GameType::parse_loose(s).ok_or_else(|| GameSimError::UnknownGameType(s.to_string()))
    }
}

/// Canonical move token.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Move {
    /// Prisoner's dilemma cooperative move.
    Cooperate,
    /// Prisoner's dilemma competitive move.
    Defect,
    /// Stag hunt risky joint move.
    Stag,
    /// Stag hunt safe solo move.
    Hare,
    /// Hawk-dove aggressive move.
    Hawk,
    /// Hawk-dove yielding move.
    Dove,
    /// Coordination first option.
    OptionA,
    /// Coordination second option.
    OptionB,
}

impl Move {
    /// Canonical token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Move::Cooperate => "cooperate",
            Move::Defect => "defect",
            Move::Stag => "stag",
            Move::Hare => "hare",
            Move::Hawk => "hawk",
            Move::Dove => "dove",
            Move::OptionA => "option_a",
            Move::OptionB => "option_b",
        }
    }

    /// Parse an exact canonical token (case and surrounding whitespace
    /// ignored).
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        [
            Move::Cooperate,
            Move::Defect,
            Move::Stag,
            Move::Hare,
            Move::Hawk,
            Move::Dove,
            Move::OptionA,
            Move::OptionB,
        ]
        .into_iter()
        .find(|m| m.as_str() == token)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Move {
    type Err = GameSimError;

    fn from_str(s: &str) -> Result<Self> {
        Move::from_token(s)
            .ok_or_else(|| GameSimError::invalid_value("move", s, "not a canonical move"))
    }
}

/// One keyword rule: any keyword found as a substring selects `target`.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    /// Canonical move selected by this rule.
    pub target: Move,
    /// Lower-case substrings that trigger the rule.
    pub keywords: &'static [&'static str],
}

impl KeywordRule {
    /// Whether any keyword occurs in `text` (already lower-cased).
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k))
    }
}

/// First rule in `rules` that matches `text`.
pub fn match_rules(rules: &[KeywordRule], text: &str) -> Option<Move> {
    rules.iter().find(|r| r.matches(text)).map(|r| r.target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_types() {
        assert_eq!("pd".parse::<GameType>().unwrap(), GameType::PrisonersDilemma);
        assert_eq!(" Stag_Hunt ".parse::<GameType>().unwrap(), GameType::StagHunt);
        assert_eq!("coord".parse::<GameType>().unwrap(), GameType::Coordination);
        assert!(matches!(
            "chess".parse::<GameType>(),
            Err(GameSimError::UnknownGameType(_))
        ));
    }

    #[test]
    fn test_safe_defaults_are_canonical() {
        for game in GameType::ALL {
            assert!(game.accepts(game.safe_default()));
        }
        assert_eq!(GameType::HawkDove.safe_default(), Move::Dove);
        assert_eq!(GameType::HawkDove.moves()[0], Move::Hawk);
    }

    #[test]
    fn test_move_tokens() {
        assert_eq!(Move::from_token("OPTION_B"), Some(Move::OptionB));
        assert_eq!(Move::from_token("cooperate please"), None);
        assert_eq!(
            serde_json::to_string(&Move::OptionA).unwrap(),
            "\"option_a\""
        );
    }

    #[test]
    fn test_rules_are_ordered() {
        const RULES: &[KeywordRule] = &[
            KeywordRule {
                target: Move::Cooperate,
                keywords: &["trust"],
            },
            KeywordRule {
                target: Move::Defect,
                keywords: &["betray"],
            },
        ];
        assert_eq!(match_rules(RULES, "i betray your trust"), Some(Move::Cooperate));
        assert_eq!(match_rules(RULES, "i betray you"), Some(Move::Defect));
        assert_eq!(match_rules(RULES, "no idea"), None);
    }
}
