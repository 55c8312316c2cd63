//! Persistence sinks.
//!
//! The engine reports every recordable event to a [`Recorder`]. Recorders
//! are fire-and-forget from the engine's point of view: [`RecordSink`]
//! logs and counts write failures instead of propagating them, so a full
//! disk degrades the record but never the run.

mod file;
mod memory;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::SimulationResult;
use crate::error::Result;
use crate::game::{GameType, Move};
use crate::history::PairingRecord;
use crate::provider::CallType;

pub use file::{CsvRecorder, RunSummary};
pub use memory::MemoryRecorder;

/// Completed pairings between two snapshot writes.
pub const SNAPSHOT_INTERVAL: usize = 10;

/// One recordable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A canonical move.
    Move {
        /// Pairing id.
        pairing_id: u32,
        /// Round number.
        round: u32,
        /// Agent that moved.
        agent_id: String,
        /// Game played.
        game_type: GameType,
        /// Move played.
        choice: Move,
    },
    /// A delivered message.
    Communication {
        /// Pairing id.
        pairing_id: u32,
        /// Round number.
        round: u32,
        /// Sender.
        sender_id: String,
        /// Receiver.
        receiver_id: String,
        /// Visible text.
        message: String,
    },
    /// A private thinking segment.
    Thinking {
        /// Pairing id (the just-finished pairing for gossip calls).
        pairing_id: u32,
        /// Round number; none for memory and gossip calls.
        round: Option<u32>,
        /// Agent that thought.
        agent_id: String,
        /// Call that produced it.
        call_type: CallType,
        /// Thinking text.
        text: String,
    },
    /// A memory written at the end of a pairing.
    Memory {
        /// Pairing id.
        pairing_id: u32,
        /// Agent holding the memory.
        agent_id: String,
        /// Agent the memory is about.
        about_agent_id: String,
        /// Memory text.
        memory: String,
    },
    /// Gossip delivered to a third agent.
    Gossip {
        /// Gossiping agent.
        sender_id: String,
        /// Agent told.
        receiver_id: String,
        /// Agent talked about.
        about_agent_id: String,
        /// Gossip text.
        gossip: String,
    },
    /// A payoff received.
    Payoff {
        /// Pairing id.
        pairing_id: u32,
        /// Round number.
        round: u32,
        /// Agent paid.
        agent_id: String,
        /// Game played.
        game_type: GameType,
        /// Payoff.
        payoff: i32,
    },
}

/// Destination for simulation records.
pub trait Recorder {
    /// Persist one event.
    fn record(&mut self, event: &Event) -> Result<()>;

    /// A pairing closed. Implementations keep it for the snapshot.
    fn pairing_completed(&mut self, pairing: &PairingRecord) -> Result<()>;

    /// The run ended. Flush everything and write final artifacts.
    fn finalize(&mut self, result: &SimulationResult) -> Result<()>;
}

/// Recorder that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record(&mut self, _event: &Event) -> Result<()> {
        Ok(())
    }

    fn pairing_completed(&mut self, _pairing: &PairingRecord) -> Result<()> {
        Ok(())
    }

    fn finalize(&mut self, _result: &SimulationResult) -> Result<()> {
        Ok(())
    }
}

/// Engine-side wrapper that absorbs recorder failures.
pub struct RecordSink {
    inner: Box<dyn Recorder + Send>,
    failures: u32,
}

impl RecordSink {
    /// Wrap a recorder.
    pub fn new(recorder: impl Recorder + Send + 'static) -> Self {
        Self {
            inner: Box::new(recorder),
            failures: 0,
        }
    }

    /// Write failures so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record an event.
    pub fn emit(&mut self, event: Event) {
        if let Err(e) = self.inner.record(&event) {
            self.failures += 1;
            error!(error = %e, ?event, "failed to record event");
        }
    }

    /// Record a thinking segment when there is one.
    pub fn thinking(
        &mut self,
        pairing_id: u32,
        round: Option<u32>,
        agent_id: &str,
        call_type: CallType,
        thinking: Option<String>,
    ) {
        if let Some(text) = thinking {
            self.emit(Event::Thinking {
                pairing_id,
                round,
                agent_id: agent_id.to_string(),
                call_type,
                text,
            });
        }
    }

    /// Hand a closed pairing to the recorder.
    pub fn pairing_completed(&mut self, pairing: &PairingRecord) {
        if let Err(e) = self.inner.pairing_completed(pairing) {
            self.failures += 1;
            error!(error = %e, pairing_id = pairing.pairing_id, "failed to record pairing");
        }
    }

    /// Finalize the recorder.
    pub fn finalize(&mut self, result: &SimulationResult) {
        if let Err(e) = self.inner.finalize(result) {
            self.failures += 1;
            error!(error = %e, "failed to finalize records");
        }
    }
}

impl Default for RecordSink {
    fn default() -> Self {
        Self::new(NullRecorder)
    }
}

impl std::fmt::Debug for RecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameSimError;

    struct Broken;

    impl Recorder for Broken {
        fn record(&mut self, _event: &Event) -> Result<()> {
            Err(GameSimError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        fn pairing_completed(&mut self, _pairing: &PairingRecord) -> Result<()> {
            Ok(())
        }

        fn finalize(&mut self, _result: &SimulationResult) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_counts_failures() {
        let mut sink = RecordSink::new(Broken);
        sink.emit(Event::Gossip {
            sender_id: "a".to_string(),
            receiver_id: "c".to_string(),
            about_agent_id: "b".to_string(),
            gossip: "b cheats".to_string(),
        });
        sink.thinking(0, None, "a", CallType::MemoryUpdate, None);
        assert_eq!(sink.failures(), 1);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = Event::Move {
            pairing_id: 0,
            round: 1,
            agent_id: "a".to_string(),
            game_type: GameType::StagHunt,
            choice: Move::Stag,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "move");
        assert_eq!(json["choice"], "stag");
    }
}
