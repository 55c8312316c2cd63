//! Offline analysis of a run's output directory.
//!
//! Reads the newest `moves_*.csv` (required), `payoffs_*.csv` and
//! `communications_*.csv` and reports cooperation, payoff, communication
//! and outcome-pattern breakdowns.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::is_cooperative;
use crate::error::{GameSimError, Result};
use crate::game::{GameType, Move};

const TOP_WORDS: usize = 10;
const MIN_WORD_CHARS: usize = 4;

/// Strategy name of an agent id: the id minus its two trailing index
/// segments (`tit_for_tat_0_1` → `tit_for_tat`).
pub fn strategy_of(agent_id: &str) -> &str {
    agent_id.rsplitn(3, '_').last().unwrap_or(agent_id)
}

/// Cooperative moves out of all moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// Cooperative moves.
    pub cooperative: u32,
    /// All moves.
    pub total: u32,
}

impl Rate {
    fn add(&mut self, cooperative: bool) {
        self.total += 1;
        self.cooperative += u32::from(cooperative);
    }

    /// Share of cooperative moves; 0 when empty.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.cooperative) / f64::from(self.total)
        }
    }
}

/// Mean payoff over `n` observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoffMean {
    /// Mean payoff.
    pub mean: f64,
    /// Observations.
    pub n: u32,
}

#[derive(Debug, Deserialize)]
struct MoveRow {
    pairing_id: u32,
    round: u32,
    agent_id: String,
    game_type: GameType,
    #[serde(rename = "move")]
    choice: Move,
}

#[derive(Debug, Deserialize)]
struct PayoffRow {
    agent_id: String,
    game_type: GameType,
    payoff: i32,
}

#[derive(Debug, Deserialize)]
struct CommunicationRow {
    sender_id: String,
    message: String,
}

/// Analysis of one output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Directory analysed.
    pub output_dir: String,
    /// Moves recorded.
    pub total_moves: usize,
    /// Messages recorded.
    pub total_communications: usize,
    /// Over all moves.
    pub overall_cooperation: Rate,
    /// Game → rate.
    pub cooperation_by_game: BTreeMap<GameType, Rate>,
    /// Strategy → rate.
    pub cooperation_by_strategy: BTreeMap<String, Rate>,
    /// Strategy → mean payoff.
    pub payoff_by_strategy: BTreeMap<String, PayoffMean>,
    /// Game → mean payoff.
    pub payoff_by_game: BTreeMap<GameType, PayoffMean>,
    /// Strategy → messages sent.
    pub messages_by_strategy: BTreeMap<String, u32>,
    /// Most frequent words longer than three characters.
    pub top_words: Vec<(String, u32)>,
    /// Game → outcome pattern → rounds.
    pub outcome_patterns: BTreeMap<GameType, BTreeMap<String, u32>>,
}

impl AnalysisReport {
    /// Analyse the newest record files in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let moves_path = newest(dir, "moves_")?.ok_or_else(|| {
            GameSimError::Config(format!("No move files found in {}", dir.display()))
        })?;
        let moves: Vec<MoveRow> = read_rows(&moves_path)?;
        let payoffs: Vec<PayoffRow> = match newest(dir, "payoffs_")? {
            Some(path) => read_rows(&path)?,
            None => Vec::new(),
        };
        let communications: Vec<CommunicationRow> = match newest(dir, "communications_")? {
            Some(path) => read_rows(&path)?,
            None => Vec::new(),
        };
        info!("Loaded {} moves from {}", moves.len(), moves_path.display());

        Ok(Self::build(
            dir.display().to_string(),
            &moves,
            &payoffs,
            &communications,
        ))
    }

    fn build(
        output_dir: String,
        moves: &[MoveRow],
        payoffs: &[PayoffRow],
        communications: &[CommunicationRow],
    ) -> Self {
        let mut overall = Rate::default();
        let mut by_game: BTreeMap<GameType, Rate> = BTreeMap::new();
        let mut by_strategy: BTreeMap<String, Rate> = BTreeMap::new();
        let mut rounds: BTreeMap<(u32, u32), (GameType, Vec<Move>)> = BTreeMap::new();

        for row in moves {
            let coop = is_cooperative(row.game_type, row.choice);
            overall.add(coop);
            by_game.entry(row.game_type).or_default().add(coop);
            by_strategy
                .entry(strategy_of(&row.agent_id).to_string())
                .or_default()
                .add(coop);
            rounds
                .entry((row.pairing_id, row.round))
                .or_insert_with(|| (row.game_type, Vec::new()))
                .1
                .push(row.choice);
        }

        let mut outcome_patterns: BTreeMap<GameType, BTreeMap<String, u32>> = BTreeMap::new();
        for (game, round_moves) in rounds.values() {
            if let [a, b] = round_moves.as_slice() {
                *outcome_patterns
                    .entry(*game)
                    .or_default()
                    .entry(outcome_pattern(*game, *a, *b).to_string())
                    .or_default() += 1;
            }
        }

        let mut strategy_sums: BTreeMap<String, (i64, u32)> = BTreeMap::new();
        let mut game_sums: BTreeMap<GameType, (i64, u32)> = BTreeMap::new();
        for row in payoffs {
            let entry = strategy_sums
                .entry(strategy_of(&row.agent_id).to_string())
                .or_default();
            entry.0 += i64::from(row.payoff);
            entry.1 += 1;
            let entry = game_sums.entry(row.game_type).or_default();
            entry.0 += i64::from(row.payoff);
            entry.1 += 1;
        }

        let mut messages_by_strategy: BTreeMap<String, u32> = BTreeMap::new();
        let mut words: BTreeMap<String, u32> = BTreeMap::new();
        for row in communications {
            *messages_by_strategy
                .entry(strategy_of(&row.sender_id).to_string())
                .or_default() += 1;
            for word in row.message.to_lowercase().split_whitespace() {
                if word.chars().count() >= MIN_WORD_CHARS {
                    *words.entry(word.to_string()).or_default() += 1;
                }
            }
        }
        let mut top_words: Vec<(String, u32)> = words.into_iter().collect();
        top_words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_words.truncate(TOP_WORDS);

        Self {
            output_dir,
            total_moves: moves.len(),
            total_communications: communications.len(),
            overall_cooperation: overall,
            cooperation_by_game: by_game,
            cooperation_by_strategy: by_strategy,
            payoff_by_strategy: means(strategy_sums),
            payoff_by_game: means(game_sums),
            messages_by_strategy,
            top_words,
            outcome_patterns,
        }
    }

    /// Write the report as pretty JSON.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "\n{rule}\nSIMULATION SUMMARY REPORT\n{rule}");
        let _ = writeln!(out, "\nTotal moves recorded: {}", self.total_moves);
        let _ = writeln!(out, "Total communications: {}", self.total_communications);

        let _ = writeln!(out, "\n=== Cooperation Analysis ===");
        let _ = writeln!(
            out,
            "Overall cooperation rate: {}",
            pct(self.overall_cooperation.rate())
        );
        let _ = writeln!(out, "\nCooperation rate by game type:");
        for (game, rate) in &self.cooperation_by_game {
            let _ = writeln!(out, "  {}: {}", game, fmt_rate(rate));
        }
        let _ = writeln!(out, "\nCooperation rate by strategy:");
        let mut strategies: Vec<_> = self.cooperation_by_strategy.iter().collect();
        strategies.sort_by(|a, b| b.1.rate().total_cmp(&a.1.rate()));
        for (strategy, rate) in strategies {
            let _ = writeln!(out, "  {}: {}", strategy, fmt_rate(rate));
        }

        if self.payoff_by_strategy.is_empty() {
            let _ = writeln!(out, "\nNo payoff data available");
        } else {
            let _ = writeln!(out, "\n=== Payoff Analysis ===");
            let _ = writeln!(out, "\nAverage payoff by strategy:");
            let mut ranked: Vec<_> = self.payoff_by_strategy.iter().collect();
            ranked.sort_by(|a, b| b.1.mean.total_cmp(&a.1.mean));
            for (strategy, mean) in ranked {
                let _ = writeln!(out, "  {}: {:.2} (n={})", strategy, mean.mean, mean.n);
            }
            let _ = writeln!(out, "\nAverage payoff by game type:");
            for (game, mean) in &self.payoff_by_game {
                let _ = writeln!(out, "  {}: {:.2}", game, mean.mean);
            }
        }

        if self.messages_by_strategy.is_empty() {
            let _ = writeln!(out, "\nNo communication data available");
        } else {
            let _ = writeln!(out, "\n=== Communication Analysis ===");
            let _ = writeln!(out, "\nMessages sent by strategy:");
            let mut ranked: Vec<_> = self.messages_by_strategy.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1));
            for (strategy, count) in ranked {
                let _ = writeln!(out, "  {strategy}: {count}");
            }
            let _ = writeln!(out, "\nMost common words in communications:");
            for (word, count) in &self.top_words {
                let _ = writeln!(out, "  {word}: {count}");
            }
        }

        let _ = writeln!(out, "\n=== Game Outcome Patterns ===");
        for (game, patterns) in &self.outcome_patterns {
            let total: u32 = patterns.values().sum();
            let _ = writeln!(out, "\n{game}:");
            let mut ranked: Vec<_> = patterns.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1));
            for (pattern, count) in ranked {
                let share = if total > 0 {
                    f64::from(*count) / f64::from(total) * 100.0
                } else {
                    0.0
                };
                let _ = writeln!(out, "  {pattern}: {count} ({share:.1}%)");
            }
        }
        let _ = writeln!(out, "\n{rule}");
        out
    }
}

/// Outcome pattern label for one round.
pub fn outcome_pattern(game: GameType, a: Move, b: Move) -> &'static str {
    let [first, second] = game.moves();
    match game {
        GameType::Coordination if a == b => "Coordinated",
        GameType::Coordination => "Miscoordinated",
        GameType::PrisonersDilemma if a == b && a == first => "Mutual Cooperation",
        GameType::PrisonersDilemma if a == b && a == second => "Mutual Defection",
        GameType::PrisonersDilemma => "Mixed",
        GameType::StagHunt if a == b && a == first => "Both Hunt Stag",
        GameType::StagHunt if a == b && a == second => "Both Hunt Hare",
        GameType::StagHunt => "Mixed",
        GameType::HawkDove if a == b && a == Move::Hawk => "Both Hawk",
        GameType::HawkDove if a == b && a == Move::Dove => "Both Dove",
        GameType::HawkDove => "Hawk-Dove",
    }
}

fn means<K: Ord>(sums: BTreeMap<K, (i64, u32)>) -> BTreeMap<K, PayoffMean> {
    sums.into_iter()
        .map(|(k, (sum, n))| {
            let mean = if n == 0 { 0.0 } else { sum as f64 / f64::from(n) };
            (k, PayoffMean { mean, n })
        })
        .collect()
}

fn pct(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn fmt_rate(rate: &Rate) -> String {
    format!("{} ({}/{})", pct(rate.rate()), rate.cooperative, rate.total)
}

/// Newest `<prefix>*.csv` in `dir` by name (names carry the run stamp).
fn newest(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".csv"))
        })
        .collect();
    matches.sort();
    Ok(matches.pop())
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVES: &str = "\
timestamp,pairing_id,round,agent_id,game_type,move
t,0,1,tft_0_0,prisoners_dilemma,cooperate
t,0,1,always_defect_1_0,prisoners_dilemma,defect
t,0,2,tft_0_0,coordination,option_a
t,0,2,always_defect_1_0,coordination,option_a
t,1,1,tft_0_1,hawk_dove,dove
t,1,1,tft_0_0,hawk_dove,dove
";

    const PAYOFFS: &str = "\
timestamp,pairing_id,round,agent_id,game_type,payoff
t,0,1,tft_0_0,prisoners_dilemma,0
t,0,1,always_defect_1_0,prisoners_dilemma,5
t,0,2,tft_0_0,coordination,3
t,0,2,always_defect_1_0,coordination,3
";

    const COMMS: &str = "\
timestamp,pairing_id,round,sender_id,receiver_id,message
t,0,1,tft_0_0,always_defect_1_0,Let us cooperate and share
t,0,1,always_defect_1_0,tft_0_0,Sure let us cooperate
";

    fn write_run(dir: &Path) {
        std::fs::write(dir.join("moves_20240101_000000.csv"), MOVES).unwrap();
        std::fs::write(dir.join("payoffs_20240101_000000.csv"), PAYOFFS).unwrap();
        std::fs::write(dir.join("communications_20240101_000000.csv"), COMMS).unwrap();
    }

    #[test]
    fn test_strategy_of() {
        assert_eq!(strategy_of("tit_for_tat_0_1"), "tit_for_tat");
        assert_eq!(strategy_of("solo_3_0"), "solo");
        assert_eq!(strategy_of("plain"), "plain");
    }

    #[test]
    fn test_report() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let report = AnalysisReport::load(dir.path()).unwrap();

        assert_eq!(report.total_moves, 6);
        assert_eq!(report.overall_cooperation, Rate { cooperative: 5, total: 6 });
        assert_eq!(report.cooperation_by_strategy["always_defect"].rate(), 0.5);
        assert_eq!(report.payoff_by_strategy["always_defect"].mean, 4.0);
        assert_eq!(report.payoff_by_game[&GameType::Coordination].n, 2);
        assert_eq!(report.messages_by_strategy["tft"], 1);
        assert_eq!(report.top_words[0], ("cooperate".to_string(), 2));
        assert_eq!(
            report.outcome_patterns[&GameType::PrisonersDilemma]["Mixed"],
            1
        );
        assert_eq!(
            report.outcome_patterns[&GameType::HawkDove]["Both Dove"],
            1
        );
        assert!(report.render().contains("Coordinated: 1 (100.0%)"));

        let export = dir.path().join("analysis.json");
        report.export(&export).unwrap();
        let back: AnalysisReport =
            serde_json::from_slice(&std::fs::read(export).unwrap()).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_missing_moves_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AnalysisReport::load(dir.path()).is_err());
    }
}
