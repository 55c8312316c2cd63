//! In-memory record of pairings and rounds.
//!
//! A [`PairingRecord`] lives for one pairing: rounds are appended as they
//! complete, later rounds' prompts read it, and the end-of-pairing memory
//! update summarizes it. It is also the unit of the persisted snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{GameType, Move};

/// A message sent during a round's communication phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending agent.
    pub sender: String,
    /// Receiving agent.
    pub receiver: String,
    /// Visible text.
    pub text: String,
}

/// One agent's side of a completed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Agent id.
    pub agent_id: String,
    /// Canonical move played.
    #[serde(rename = "move")]
    pub choice: Move,
    /// Payoff received.
    pub payoff: i32,
}

/// A completed round. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number within the pairing.
    pub round: u32,
    /// Game played.
    pub game_type: GameType,
    /// Scenario name used as the cover story.
    pub scenario: String,
    /// Communication transcript, in delivery order.
    pub messages: Vec<Message>,
    /// First agent's outcome, then the second's.
    pub outcomes: [Outcome; 2],
    /// When the payoffs were computed.
    pub timestamp: DateTime<Utc>,
}

impl RoundRecord {
    /// Outcome for `agent_id`, if it played this round.
    pub fn outcome_of(&self, agent_id: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.agent_id == agent_id)
    }

    /// Move played by `agent_id`.
    pub fn move_of(&self, agent_id: &str) -> Option<Move> {
        self.outcome_of(agent_id).map(|o| o.choice)
    }

    /// Payoff received by `agent_id`.
    pub fn payoff_of(&self, agent_id: &str) -> Option<i32> {
        self.outcome_of(agent_id).map(|o| o.payoff)
    }

    /// `"moveA-moveB"` key used in the move distribution.
    pub fn move_pair(&self) -> String {
        format!("{}-{}", self.outcomes[0].choice, self.outcomes[1].choice)
    }
}

/// One pairing and its rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingRecord {
    /// 0-based sequential pairing id.
    pub pairing_id: u32,
    /// The two participants, in speaking order.
    pub agents: [String; 2],
    /// Completed rounds.
    pub rounds: Vec<RoundRecord>,
    /// Pairing start.
    pub started_at: DateTime<Utc>,
    /// Pairing end, once closed.
    pub ended_at: Option<DateTime<Utc>>,
}

impl PairingRecord {
    /// Open a pairing with no rounds.
    pub fn new(pairing_id: u32, first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            pairing_id,
            agents: [first.into(), second.into()],
            rounds: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Mark the pairing closed.
    pub fn close(&mut self) {
        self.ended_at = Some(Utc::now());
    }
}
