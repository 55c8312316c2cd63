//! Payoff tables and game-theoretic queries.

use super::{match_rules, GameType, KeywordRule, Move};
use crate::error::Result;

/// Payoff pair `(first player, second player)`.
pub type Payoff = (i32, i32);

/// Row = first player's move index, column = second player's move index.
fn table(game: GameType) -> [[Payoff; 2]; 2] {
    match game {
        GameType::PrisonersDilemma => [[(3, 3), (0, 5)], [(5, 0), (1, 1)]],
        GameType::StagHunt => [[(4, 4), (0, 3)], [(3, 0), (2, 2)]],
        GameType::HawkDove => [[(-1, -1), (3, 1)], [(1, 3), (2, 2)]],
        GameType::Coordination => [[(3, 3), (0, 0)], [(0, 0), (3, 3)]],
    }
}

/// Second-chance mapping for tokens that are not canonical.
fn normalization_rules(game: GameType) -> &'static [KeywordRule] {
    match game {
        GameType::PrisonersDilemma => &[
            KeywordRule {
                target: Move::Cooperate,
                keywords: &["trust", "collaborate", "share"],
            },
            KeywordRule {
                target: Move::Defect,
                keywords: &["betray", "compete", "take"],
            },
        ],
        GameType::StagHunt => &[
            KeywordRule {
                target: Move::Stag,
                keywords: &["team", "together", "big"],
            },
            KeywordRule {
                target: Move::Hare,
                keywords: &["solo", "safe", "small"],
            },
        ],
        GameType::HawkDove => &[
            KeywordRule {
                target: Move::Hawk,
                keywords: &["fight", "aggressive", "attack"],
            },
            KeywordRule {
                target: Move::Dove,
                keywords: &["peace", "yield", "share"],
            },
        ],
        GameType::Coordination => &[
            KeywordRule {
                target: Move::OptionA,
                keywords: &["a", "first"],
            },
            KeywordRule {
                target: Move::OptionB,
                keywords: &["b", "second"],
            },
        ],
    }
}

/// Pure payoff calculator over the fixed 2x2 tables.
///
/// # Example
/// ```
/// use gamesim::game::{GameType, Move, PayoffCalculator};
///
/// let calc = PayoffCalculator::new();
/// assert_eq!(calc.payoffs(GameType::PrisonersDilemma, Move::Cooperate, Move::Defect), (0, 5));
/// assert_eq!(calc.compute("stag_hunt", "stag", "stag").unwrap(), (4, 4));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoffCalculator;

impl PayoffCalculator {
    /// Create a calculator.
    pub fn new() -> Self {
        Self
    }

    /// Payoffs for two moves. A move that is not canonical for `game` is
    /// re-normalized from its token first.
    pub fn payoffs(&self, game: GameType, a: Move, b: Move) -> Payoff {
        let a = self.coerce(game, a);
        let b = self.coerce(game, b);
        // coerce() guarantees membership
        let i = game.index_of(a).unwrap_or(0);
        let j = game.index_of(b).unwrap_or(0);
        table(game)[i][j]
    }

    /// String entry point: fails with `UnknownGameType` for a game outside
    /// the closed set, normalizes both move strings otherwise.
    pub fn compute(&self, game: &str, move_a: &str, move_b: &str) -> Result<Payoff> {
        let game: GameType = game.parse()?;
        let a = self.normalize(game, move_a);
        let b = self.normalize(game, move_b);
        Ok(self.payoffs(game, a, b))
    }

    /// Map raw text onto a canonical move for `game`: exact token, then
    /// keyword rules, then the game's first move.
    pub fn normalize(&self, game: GameType, raw: &str) -> Move {
        let lowered = raw.trim().to_lowercase();
        if let Some(mv) = Move::from_token(&lowered).filter(|m| game.accepts(*m)) {
            return mv;
        }
        match_rules(normalization_rules(game), &lowered).unwrap_or(game.moves()[0])
    }

    fn coerce(&self, game: GameType, mv: Move) -> Move {
        if game.accepts(mv) {
            mv
        } else {
            self.normalize(game, mv.as_str())
        }
    }

    /// All four outcomes in enumeration order.
    pub fn outcomes(&self, game: GameType) -> impl Iterator<Item = (Move, Move)> {
        let moves = game.moves();
        moves
            .into_iter()
            .flat_map(move |a| moves.into_iter().map(move |b| (a, b)))
    }

    /// Human-readable description of the game.
    pub fn description(&self, game: GameType) -> &'static str {
        match game {
            GameType::PrisonersDilemma => {
                "A classic game where mutual cooperation yields good outcomes for both, \
                 but each player has an incentive to defect for personal gain."
            },
            GameType::StagHunt => {
                "A coordination game where the best outcome requires mutual trust and \
                 cooperation, but a safe individual option is always available."
            },
            GameType::HawkDove => {
                "A game modeling conflict where aggressive behavior pays off against \
                 peaceful opponents, but mutual aggression is costly for both."
            },
            GameType::Coordination => {
                "A pure coordination game where players must choose the same option to \
                 succeed, with no inherent advantage to either choice."
            },
        }
    }

    /// Pure-strategy Nash equilibria. Hawk-dove has none in pure strategies
    /// as modeled here.
    pub fn equilibria(&self, game: GameType) -> Vec<(Move, Move)> {
        match game {
            GameType::PrisonersDilemma => vec![(Move::Defect, Move::Defect)],
            GameType::StagHunt => vec![(Move::Stag, Move::Stag), (Move::Hare, Move::Hare)],
            GameType::HawkDove => Vec::new(),
            GameType::Coordination => vec![
                (Move::OptionA, Move::OptionA),
                (Move::OptionB, Move::OptionB),
            ],
        }
    }

    /// True iff no other outcome is at least as good for both players and
    /// strictly better for one.
    pub fn is_pareto_optimal(&self, game: GameType, a: Move, b: Move) -> bool {
        let (pa, pb) = self.payoffs(game, a, b);
        !self.outcomes(game).any(|(x, y)| {
            let (qa, qb) = self.payoffs(game, x, y);
            qa >= pa && qb >= pb && (qa > pa || qb > pb)
        })
    }

    /// Outcome with the highest summed payoff; ties keep the earliest in
    /// enumeration order.
    pub fn social_optimum(&self, game: GameType) -> (Move, Move) {
        let mut best = None;
        for (a, b) in self.outcomes(game) {
            let (pa, pb) = self.payoffs(game, a, b);
            let total = pa + pb;
            match best {
                Some((_, best_total)) if best_total >= total => {},
                _ => best = Some(((a, b), total)),
            }
        }
        best.map(|(pair, _)| pair)
            .unwrap_or((game.moves()[0], game.moves()[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameSimError;
    use proptest::prelude::*;

    #[test]
    fn test_tables_match_reference() {
        let calc = PayoffCalculator::new();
        use GameType::*;
        use Move::*;

        assert_eq!(calc.payoffs(PrisonersDilemma, Cooperate, Cooperate), (3, 3));
        assert_eq!(calc.payoffs(PrisonersDilemma, Cooperate, Defect), (0, 5));
        assert_eq!(calc.payoffs(PrisonersDilemma, Defect, Cooperate), (5, 0));
        assert_eq!(calc.payoffs(PrisonersDilemma, Defect, Defect), (1, 1));
        assert_eq!(calc.payoffs(StagHunt, Stag, Hare), (0, 3));
        assert_eq!(calc.payoffs(StagHunt, Hare, Hare), (2, 2));
        assert_eq!(calc.payoffs(HawkDove, Hawk, Hawk), (-1, -1));
        assert_eq!(calc.payoffs(HawkDove, Hawk, Dove), (3, 1));
        assert_eq!(calc.payoffs(Coordination, OptionA, OptionB), (0, 0));
        assert_eq!(calc.payoffs(Coordination, OptionB, OptionB), (3, 3));
    }

    #[test]
    fn test_compute_normalizes_strings() {
        let calc = PayoffCalculator::new();
        assert_eq!(calc.compute("prisoners_dilemma", " Cooperate ", "betray").unwrap(), (0, 5));
        assert_eq!(calc.compute("hawk_dove", "attack!", "make peace").unwrap(), (3, 1));
        // unresolvable text falls back to the first canonical move
        assert_eq!(calc.compute("hawk_dove", "???", "???").unwrap(), (-1, -1));
    }

    #[test]
    fn test_foreign_move_is_renormalized() {
        let calc = PayoffCalculator::new();
        // "stag" means nothing in PD, so it becomes the first move
        assert_eq!(
            calc.payoffs(GameType::PrisonersDilemma, Move::Stag, Move::Defect),
            (0, 5)
        );
    }

    #[test]
    fn test_unknown_game_type() {
        let calc = PayoffCalculator::new();
        let err = calc.compute("chess", "e4", "e5").unwrap_err();
        assert!(matches!(err, GameSimError::UnknownGameType(ref g) if g == "chess"));
    }

    #[test]
    fn test_pareto_optimality() {
        let calc = PayoffCalculator::new();
        let pd = GameType::PrisonersDilemma;
        assert!(!calc.is_pareto_optimal(pd, Move::Defect, Move::Defect));
        assert!(calc.is_pareto_optimal(pd, Move::Cooperate, Move::Cooperate));
        assert!(calc.is_pareto_optimal(pd, Move::Defect, Move::Cooperate));
        assert!(!calc.is_pareto_optimal(GameType::Coordination, Move::OptionA, Move::OptionB));
    }

    #[test]
    fn test_social_optimum() {
        let calc = PayoffCalculator::new();
        assert_eq!(
            calc.social_optimum(GameType::PrisonersDilemma),
            (Move::Cooperate, Move::Cooperate)
        );
        assert_eq!(calc.social_optimum(GameType::HawkDove), (Move::Hawk, Move::Dove));
        // tie between (a, a) and (b, b): enumeration order wins
        assert_eq!(
            calc.social_optimum(GameType::Coordination),
            (Move::OptionA, Move::OptionA)
        );
    }

    #[test]
    fn test_equilibria() {
        let calc = PayoffCalculator::new();
        assert!(calc.equilibria(GameType::HawkDove).is_empty());
        assert_eq!(calc.equilibria(GameType::StagHunt).len(), 2);
    }

    fn any_game() -> impl Strategy<Value = GameType> {
        prop::sample::select(GameType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_payoff_symmetry(game in any_game(), i in 0usize..2, j in 0usize..2) {
            let calc = PayoffCalculator::new();
            let moves = game.moves();
            let (a, b) = calc.payoffs(game, moves[i], moves[j]);
            let (c, d) = calc.payoffs(game, moves[j], moves[i]);
            prop_assert_eq!((a, b), (d, c));
        }

        #[test]
        fn prop_normalize_is_canonical(game in any_game(), raw in ".{0,40}") {
            let calc = PayoffCalculator::new();
            prop_assert!(game.accepts(calc.normalize(game, &raw)));
        }
    }
}
