//! Canonical move extraction from free text.
//!
//! Order of precedence:
//! 1. the scenario's option labels, in declared order
//! 2. per-game keyword rules (cooperative rule first, except hawk-dove)
//! 3. the game's safe default, flagged as a fallback

use crate::game::{match_rules, GameType, KeywordRule, Move};

/// Extraction outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    /// Canonical move for the game.
    pub choice: Move,
    /// True when nothing in the text matched and the safe default was used.
    pub fallback: bool,
}

/// Keyword rules per game, in match order.
pub fn keyword_rules(game: GameType) -> &'static [KeywordRule] {
    match game {
        GameType::PrisonersDilemma => &[
            KeywordRule {
                target: Move::Cooperate,
                keywords: &["cooperate", "collaborate", "trust", "share"],
            },
            KeywordRule {
                target: Move::Defect,
                keywords: &["defect", "betray", "compete", "take"],
            },
        ],
        GameType::StagHunt => &[
            KeywordRule {
                target: Move::Stag,
                keywords: &["stag", "collaborate", "team", "together", "big"],
            },
            KeywordRule {
                target: Move::Hare,
                keywords: &["hare", "solo", "individual", "safe", "small"],
            },
        ],
        // hawk is checked first here, unlike the other games
        GameType::HawkDove => &[
            KeywordRule {
                target: Move::Hawk,
                keywords: &["hawk", "aggressive", "fight", "attack"],
            },
            KeywordRule {
                target: Move::Dove,
                keywords: &["dove", "peaceful", "yield", "peace"],
            },
        ],
        GameType::Coordination => &[
            KeywordRule {
                target: Move::OptionA,
                keywords: &["option a", "a", "first"],
            },
            KeywordRule {
                target: Move::OptionB,
                keywords: &["option b", "b", "second"],
            },
        ],
    }
}

/// Map a provider response onto a canonical move for `game`.
///
/// `mapping` is the scenario's label → move table; labels that map outside
/// `game` are skipped.
pub fn extract_move(response: &str, game: GameType, mapping: &[(String, Move)]) -> Extraction {
    let lowered = response.trim().to_lowercase();

    let by_label = mapping
        .iter()
        .filter(|(_, mv)| game.accepts(*mv))
        .find(|(label, _)| {
            let label = label.trim().to_lowercase();
            !label.is_empty() && lowered.contains(&label)
        })
        .map(|(_, mv)| *mv);

    match by_label.or_else(|| match_rules(keyword_rules(game), &lowered)) {
        Some(choice) => Extraction {
            choice,
            fallback: false,
        },
        None => Extraction {
            choice: game.safe_default(),
            fallback: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioCatalog;
    use proptest::prelude::*;

    fn mapping(game: GameType, name: &str) -> Vec<(String, Move)> {
        ScenarioCatalog::builtin()
            .scenarios(game)
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.move_mapping.clone())
            .unwrap()
    }

    #[test]
    fn test_scenario_labels_win() {
        let map = mapping(GameType::PrisonersDilemma, "Price Competition");
        // "cut prices" is a label even though "share" is a cooperative keyword
        let got = extract_move("I will CUT PRICES to share the market", GameType::PrisonersDilemma, &map);
        assert_eq!(got.choice, Move::Defect);
        assert!(!got.fallback);
    }

    #[test]
    fn test_labels_scanned_in_declared_order() {
        let map = mapping(GameType::PrisonersDilemma, "Price Competition");
        let got = extract_move(
            "either cut prices or maintain prices",
            GameType::PrisonersDilemma,
            &map,
        );
        assert_eq!(got.choice, Move::Cooperate);
    }

    #[test]
    fn test_keyword_fallback() {
        let pd = GameType::PrisonersDilemma;
        assert_eq!(extract_move("Defect.", pd, &[]).choice, Move::Defect);
        // cooperative keywords are checked first
        assert_eq!(extract_move("betray their trust", pd, &[]).choice, Move::Cooperate);
        assert_eq!(
            extract_move("go it alone, stay small", GameType::StagHunt, &[]).choice,
            Move::Hare
        );
        // aggressive keywords win in hawk-dove
        assert_eq!(
            extract_move("I yield rather than fight", GameType::HawkDove, &[]).choice,
            Move::Hawk
        );
        assert_eq!(
            extract_move("peace, I yield", GameType::HawkDove, &[]).choice,
            Move::Dove
        );
        assert_eq!(
            extract_move("attack", GameType::HawkDove, &[]).choice,
            Move::Hawk
        );
    }

    #[test]
    fn test_hawk_dove_agrees_with_payoff_normalizer() {
        let calc = crate::game::PayoffCalculator::new();
        for text in [
            "I will fight, not yield",
            "attack now, peace later",
            "aggressive but open to peace",
            "I yield",
        ] {
            let got = extract_move(text, GameType::HawkDove, &[]);
            assert!(!got.fallback, "{text}");
            assert_eq!(got.choice, calc.normalize(GameType::HawkDove, text), "{text}");
        }
    }

    #[test]
    fn test_safe_default_is_flagged() {
        for (game, expected) in [
            (GameType::PrisonersDilemma, Move::Cooperate),
            (GameType::StagHunt, Move::Stag),
            (GameType::HawkDove, Move::Dove),
            (GameType::Coordination, Move::OptionA),
        ] {
            let got = extract_move("???", game, &[]);
            assert_eq!(got.choice, expected);
            assert!(got.fallback);
        }
    }

    #[test]
    fn test_foreign_mapping_entries_are_ignored() {
        let map = vec![("go".to_string(), Move::Hawk)];
        let got = extract_move("go", GameType::PrisonersDilemma, &map);
        assert_eq!(got.choice, Move::Cooperate);
        assert!(got.fallback);
    }

    proptest! {
        #[test]
        fn prop_extraction_is_canonical(
            game in prop::sample::select(GameType::ALL.to_vec()),
            response in "\\PC{0,80}",
        ) {
            let map = ScenarioCatalog::builtin().scenarios(game)[0].move_mapping.clone();
            prop_assert!(game.accepts(extract_move(&response, game, &map).choice));
            prop_assert!(game.accepts(extract_move(&response, game, &[]).choice));
        }
    }
}
