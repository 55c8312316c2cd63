//! Run-wide statistics.

use std::collections::BTreeMap;

use crate::game::{GameType, Move};
use crate::history::RoundRecord;

/// Whether `mv` counts as cooperative for the primary cooperation rate.
/// Both coordination options count.
pub fn is_cooperative(game: GameType, mv: Move) -> bool {
    match game {
        GameType::PrisonersDilemma => mv == Move::Cooperate,
        GameType::StagHunt => mv == Move::Stag,
        GameType::HawkDove => mv == Move::Dove,
        GameType::Coordination => game.accepts(mv),
    }
}

/// Counters accumulated across all pairings of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Completed pairings.
    pub total_pairings: u32,
    /// Completed rounds.
    pub total_rounds: u32,
    /// Game → `"moveA-moveB"` → count.
    pub moves_by_game: BTreeMap<GameType, BTreeMap<String, u32>>,
    total_moves: u64,
    cooperative_moves: u64,
    ewan_cooperative_moves: u64,
}

impl RunStats {
    /// Fold one completed round into the counters.
    pub fn record_round(&mut self, round: &RoundRecord) {
        self.total_rounds += 1;
        *self
            .moves_by_game
            .entry(round.game_type)
            .or_default()
            .entry(round.move_pair())
            .or_default() += 1;

        let game = round.game_type;
        let [a, b] = [round.outcomes[0].choice, round.outcomes[1].choice];
        self.total_moves += 2;
        self.cooperative_moves +=
            u64::from(is_cooperative(game, a)) + u64::from(is_cooperative(game, b));
        self.ewan_cooperative_moves += if game == GameType::Coordination {
            if a == b {
                2
            } else {
                0
            }
        } else {
            u64::from(is_cooperative(game, a)) + u64::from(is_cooperative(game, b))
        };
    }

    /// Share of cooperative moves; 0 before any round.
    pub fn cooperation_rate(&self) -> f64 {
        ratio(self.cooperative_moves, self.total_moves)
    }

    /// Like [`RunStats::cooperation_rate`], except that coordination moves
    /// count only when both players chose the same option.
    pub fn coop_ewan(&self) -> f64 {
        ratio(self.ewan_cooperative_moves, self.total_moves)
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
