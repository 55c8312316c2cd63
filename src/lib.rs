//! # GameSim - Repeated Multi-Agent Game Theory Experiments
//!
//! Populations of LLM-driven agents meet in pairings, talk, and play short
//! sequences of 2x2 games dressed up as business scenarios. Agents keep a
//! private memory of every opponent and may gossip about past opponents to
//! third agents. Every move, message, payoff, memory and gossip is recorded.
//!
//! ## Features
//!
//! - **Four games**: prisoner's dilemma, stag hunt, hawk-dove, coordination
//! - **Scenario cover stories**: option labels mapped onto canonical moves
//! - **Memory and gossip**: per-peer memories, capped, rewritten after each pairing
//! - **Robust extraction**: free text always maps onto a canonical move
//! - **Dry run**: fixed canonical answers, no provider calls
//! - **Batch runs**: isolated child processes with timeouts and a summary
//!
//! ## Architecture
//!
//! ```text
//!  Simulation ── pick 2 agents ──> Pairing ──────────────> Gossip
//!      │                             │  per round:            │
//!      │                             │  game + scenario       │ third agent
//!      │                             │  A/B communicate       │ receive_gossip
//!      │                             │  A/B decide            │
//!      │                             │  payoffs               │
//!      │                             │  memory update         │
//!      v                             v                        v
//!  RunStats                      RecordSink ───> Recorder (CSV/JSON, memory)
//! ```
//!
//! ### Pairing State Machine
//!
//! ```text
//!  [RoundCount] ──> [GameSelect] ──> [Communication] ──> [Decision]
//!                        ^                                    │
//!                        │                                    v
//!                  [HistoryAppend] <─────────────────── [Payoff]
//!                        │ last round
//!                        v
//!                  [MemoryUpdate] ──> [Close]
//! ```
//!
//! ### Payoff Tables
//!
//! | Game              | both first | first/second | second/first | both second |
//! |-------------------|------------|--------------|--------------|-------------|
//! | prisoners_dilemma | 3,3        | 0,5          | 5,0          | 1,1         |
//! | stag_hunt         | 4,4        | 0,3          | 3,0          | 2,2         |
//! | hawk_dove         | -1,-1      | 3,1          | 1,3          | 2,2         |
//! | coordination      | 3,3        | 0,0          | 0,0          | 3,3         |
//!
//! ## Quick Start
//!
//! ```rust
//! use gamesim::{AgentSpec, DryRunProvider, ExperimentConfig, GameType, GameWeights, Simulation};
//! use rand::SeedableRng;
//!
//! # tokio_test::block_on(async {
//! let specs = vec![
//!     AgentSpec::new("tit_for_tat", "Start cooperative, then mirror your opponent."),
//!     AgentSpec::new("always_defect", "Always act in your own interest."),
//! ];
//! let config = ExperimentConfig {
//!     total_pairings: 1,
//!     avg_rounds: 2,
//!     game_proportions: GameWeights::only(GameType::PrisonersDilemma),
//!     ..ExperimentConfig::default()
//! };
//!
//! let rng = rand::rngs::StdRng::seed_from_u64(42);
//! let mut sim = Simulation::new(&specs, config, DryRunProvider, rng, true).unwrap();
//! let result = sim.run().await.unwrap();
//!
//! assert_eq!(result.total_rounds, 2);
//! assert_eq!(result.cooperation_rate, 1.0);
//! # });
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: Simulation driver, pairing orchestrator, gossip, statistics
//! - [`agent`]: Agents, prompts and move extraction
//! - [`game`]: Game types, canonical moves and payoffs
//! - [`scenario`]: Scenario catalog
//! - [`provider`]: Decision providers (HTTP, dry run, scripted)
//! - [`record`]: Record sinks (CSV/JSON files, in memory)
//! - [`batch`]: Batch runner and summary
//! - [`analysis`]: Offline analysis of a run's output
//! - [`config`]: Agent roster and experiment parameters
//! - [`error`]: Error types and result aliases

pub mod agent;
pub mod analysis;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod history;
pub mod provider;
pub mod record;
pub mod scenario;

// Re-exports for convenience
pub use agent::{Agent, AgentStats};
pub use config::{AgentSpec, ExperimentConfig, GameWeights, ProviderConfig};
pub use engine::{Simulation, SimulationResult};
pub use error::{GameSimError, Result};
pub use game::{GameType, Move, PayoffCalculator};
pub use provider::{CallType, DecisionProvider, DryRunProvider, HttpProvider};
pub use record::{CsvRecorder, MemoryRecorder, Recorder};
pub use scenario::{Scenario, ScenarioCatalog};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
