//! CSV and JSON files in a run's output directory.
//!
//! Layout (one `<stamp>` = `%Y%m%d_%H%M%S` per run):
//!
//! | file | content |
//! |---|---|
//! | `moves_<stamp>.csv` | timestamp, pairing_id, round, agent_id, game_type, move |
//! | `communications_<stamp>.csv` | timestamp, pairing_id, round, sender_id, receiver_id, message |
//! | `thinking_<stamp>.csv` | timestamp, pairing_id, round, agent_id, context, thinking |
//! | `memories_<stamp>.csv` | timestamp, pairing_id, agent_id, about_agent_id, memory |
//! | `gossip_<stamp>.csv` | timestamp, sender_id, receiver_id, about_agent_id, gossip |
//! | `payoffs_<stamp>.csv` | timestamp, pairing_id, round, agent_id, game_type, payoff |
//! | `complete_log_<stamp>.json` | snapshot of every closed pairing |
//! | `summary_<stamp>.json` | move counts per game and the file list |
//! | `results_<stamp>.json` | the aggregate [`SimulationResult`] |

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Event, Recorder, SNAPSHOT_INTERVAL};
use crate::engine::SimulationResult;
use crate::error::Result;
use crate::history::PairingRecord;

/// File stamp format.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const STREAMS: [(&str, &[&str]); 6] = [
    (
        "moves",
        &["timestamp", "pairing_id", "round", "agent_id", "game_type", "move"],
    ),
    (
        "communications",
        &["timestamp", "pairing_id", "round", "sender_id", "receiver_id", "message"],
    ),
    (
        "thinking",
        &["timestamp", "pairing_id", "round", "agent_id", "context", "thinking"],
    ),
    (
        "memories",
        &["timestamp", "pairing_id", "agent_id", "about_agent_id", "memory"],
    ),
    (
        "gossip",
        &["timestamp", "sender_id", "receiver_id", "about_agent_id", "gossip"],
    ),
    (
        "payoffs",
        &["timestamp", "pairing_id", "round", "agent_id", "game_type", "payoff"],
    ),
];

/// Contents of `summary_<stamp>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: String,
    /// File stamp.
    pub timestamp: String,
    /// Pairings in the snapshot.
    pub total_pairings: usize,
    /// Stream name → path.
    pub log_files: BTreeMap<String, String>,
    /// Game → move → count, read back from the moves file.
    pub moves_by_game: BTreeMap<String, BTreeMap<String, u32>>,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    run_id: &'a str,
    timestamp: &'a str,
    started_at: DateTime<Utc>,
    saved_at: DateTime<Utc>,
    pairings: &'a [PairingRecord],
}

/// Writes every record stream to its own CSV file plus JSON snapshots.
pub struct CsvRecorder {
    dir: PathBuf,
    run_id: String,
    stamp: String,
    started_at: DateTime<Utc>,
    writers: BTreeMap<&'static str, csv::Writer<File>>,
    pairings: Vec<PairingRecord>,
}

impl CsvRecorder {
    /// Create `dir` if needed and open every stream with its header row.
    pub fn create(dir: impl AsRef<Path>, run_id: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let stamp = Local::now().format(STAMP_FORMAT).to_string();

        let mut writers = BTreeMap::new();
        for (name, header) in STREAMS {
            let path = dir.join(format!("{name}_{stamp}.csv"));
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(header)?;
            wtr.flush()?;
            writers.insert(name, wtr);
        }
        debug!("Opened record streams in {} with stamp {}", dir.display(), stamp);

        Ok(Self {
            dir,
            run_id: run_id.into(),
            stamp,
            started_at: Utc::now(),
            writers,
            pairings: Vec::new(),
        })
    }

    /// File stamp shared by every artifact of this run.
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one CSV stream (`moves`, `payoffs`, ...).
    pub fn stream_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_{}.csv", self.stamp))
    }

    /// Path of `complete_log_<stamp>.json`.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("complete_log_{}.json", self.stamp))
    }

    /// Path of `results_<stamp>.json`.
    pub fn results_path(&self) -> PathBuf {
        self.dir.join(format!("results_{}.json", self.stamp))
    }

    /// Path of `summary_<stamp>.json`.
    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("summary_{}.json", self.stamp))
    }

    fn write_row(&mut self, stream: &'static str, row: &[String]) -> Result<()> {
        if let Some(wtr) = self.writers.get_mut(stream) {
            wtr.write_record(row)?;
            wtr.flush()?;
        }
        Ok(())
    }

    fn save_snapshot(&self) -> Result<()> {
        let snapshot = Snapshot {
            run_id: &self.run_id,
            timestamp: &self.stamp,
            started_at: self.started_at,
            saved_at: Utc::now(),
            pairings: &self.pairings,
        };
        let path = self.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&snapshot)?)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Saved complete log with {} pairings", self.pairings.len());
        Ok(())
    }

    fn summarize(&self) -> Result<RunSummary> {
        let mut moves_by_game: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
        let mut rdr = csv::Reader::from_path(self.stream_path("moves"))?;
        for row in rdr.records() {
            let row = row?;
            let (Some(game), Some(mv)) = (row.get(4), row.get(5)) else {
                continue;
            };
            *moves_by_game
                .entry(game.to_string())
                .or_default()
                .entry(mv.to_string())
                .or_default() += 1;
        }

        let log_files = STREAMS
            .iter()
            .map(|(name, _)| {
                (
                    (*name).to_string(),
                    self.stream_path(name).display().to_string(),
                )
            })
            .collect();

        Ok(RunSummary {
            run_id: self.run_id.clone(),
            timestamp: self.stamp.clone(),
            total_pairings: self.pairings.len(),
            log_files,
            moves_by_game,
        })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Recorder for CsvRecorder {
    fn record(&mut self, event: &Event) -> Result<()> {
        let ts = now();
        match event {
            Event::Move {
                pairing_id,
                round,
                agent_id,
                game_type,
                choice,
            } => self.write_row(
                "moves",
                &[
                    ts,
                    pairing_id.to_string(),
                    round.to_string(),
                    agent_id.clone(),
                    game_type.to_string(),
                    choice.to_string(),
                ],
            ),
            Event::Communication {
                pairing_id,
                round,
                sender_id,
                receiver_id,
                message,
            } => self.write_row(
                "communications",
                &[
                    ts,
                    pairing_id.to_string(),
                    round.to_string(),
                    sender_id.clone(),
                    receiver_id.clone(),
                    message.clone(),
                ],
            ),
            Event::Thinking {
                pairing_id,
                round,
                agent_id,
                call_type,
                text,
            } => self.write_row(
                "thinking",
                &[
                    ts,
                    pairing_id.to_string(),
                    round.map(|r| r.to_string()).unwrap_or_default(),
                    agent_id.clone(),
                    call_type.to_string(),
                    text.clone(),
                ],
            ),
            Event::Memory {
                pairing_id,
                agent_id,
                about_agent_id,
                memory,
            } => self.write_row(
                "memories",
                &[
                    ts,
                    pairing_id.to_string(),
                    agent_id.clone(),
                    about_agent_id.clone(),
                    memory.clone(),
                ],
            ),
            Event::Gossip {
                sender_id,
                receiver_id,
                about_agent_id,
                gossip,
            } => self.write_row(
                "gossip",
                &[
                    ts,
                    sender_id.clone(),
                    receiver_id.clone(),
                    about_agent_id.clone(),
                    gossip.clone(),
                ],
            ),
            Event::Payoff {
                pairing_id,
                round,
                agent_id,
                game_type,
                payoff,
            } => self.write_row(
                "payoffs",
                &[
                    ts,
                    pairing_id.to_string(),
                    round.to_string(),
                    agent_id.clone(),
                    game_type.to_string(),
                    payoff.to_string(),
                ],
            ),
        }
    }

    fn pairing_completed(&mut self, pairing: &PairingRecord) -> Result<()> {
        self.pairings.push(pairing.clone());
        if self.pairings.len() % SNAPSHOT_INTERVAL == 0 {
            self.save_snapshot()?;
        }
        Ok(())
    }

    fn finalize(&mut self, result: &SimulationResult) -> Result<()> {
        for wtr in self.writers.values_mut() {
            wtr.flush()?;
        }
        self.save_snapshot()?;

        let summary = self.summarize()?;
        std::fs::write(self.summary_path(), serde_json::to_vec_pretty(&summary)?)?;
        std::fs::write(self.results_path(), serde_json::to_vec_pretty(result)?)?;

        info!("Finalized all logs in {}", self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameType, Move};

    #[test]
    fn test_streams_have_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = CsvRecorder::create(dir.path(), "run-1").unwrap();
        rec.record(&Event::Move {
            pairing_id: 0,
            round: 1,
            agent_id: "a_0_0".to_string(),
            game_type: GameType::HawkDove,
            choice: Move::Dove,
        })
        .unwrap();
        rec.record(&Event::Communication {
            pairing_id: 0,
            round: 1,
            sender_id: "a_0_0".to_string(),
            receiver_id: "b_1_0".to_string(),
            message: "Let's split it, fairly.".to_string(),
        })
        .unwrap();

        let mut moves = csv::Reader::from_path(rec.stream_path("moves")).unwrap();
        assert_eq!(
            moves.headers().unwrap(),
            vec!["timestamp", "pairing_id", "round", "agent_id", "game_type", "move"]
        );
        let row = moves.records().next().unwrap().unwrap();
        assert_eq!(&row[4], "hawk_dove");
        assert_eq!(&row[5], "dove");
        assert!(DateTime::parse_from_rfc3339(&row[0]).is_ok());

        let mut comms = csv::Reader::from_path(rec.stream_path("communications")).unwrap();
        let row = comms.records().next().unwrap().unwrap();
        assert_eq!(&row[5], "Let's split it, fairly.");
    }

    #[test]
    fn test_snapshot_every_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = CsvRecorder::create(dir.path(), "run-1").unwrap();
        for id in 0..(SNAPSHOT_INTERVAL as u32 - 1) {
            rec.pairing_completed(&PairingRecord::new(id, "a", "b")).unwrap();
        }
        assert!(!rec.snapshot_path().exists());

        rec.pairing_completed(&PairingRecord::new(9, "a", "b")).unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_slice(&std::fs::read(rec.snapshot_path()).unwrap()).unwrap();
        assert_eq!(snapshot["run_id"], "run-1");
        assert_eq!(snapshot["pairings"].as_array().unwrap().len(), SNAPSHOT_INTERVAL);
    }
}
