//! Simulation driver.
//!
//! A [`Simulation`] owns the agent pool, the provider, the random source and
//! the record sink. Pairings run strictly one after another: two distinct
//! agents are sampled uniformly (repeat pairings allowed), play their
//! rounds, update their memories, optionally gossip to third agents, and
//! their rounds are folded into the run-wide [`RunStats`].
//!
//! # Example
//! ```
//! use gamesim::config::{AgentSpec, ExperimentConfig};
//! use gamesim::engine::Simulation;
//! use gamesim::provider::DryRunProvider;
//! use rand::SeedableRng;
//!
//! # tokio_test::block_on(async {
//! let specs = vec![AgentSpec::new("tit_for_tat", "Mirror your opponent.").with_frequency(2)];
//! let config = ExperimentConfig { total_pairings: 3, ..ExperimentConfig::default() };
//! let rng = rand::rngs::StdRng::seed_from_u64(7);
//! let mut sim = Simulation::new(&specs, config, DryRunProvider, rng, true).unwrap();
//! let result = sim.run().await.unwrap();
//! assert_eq!(result.total_pairings, 3);
//! # });
//! ```

mod gossip;
mod pairing;
mod stats;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::{AgentSpec, ExperimentConfig};
use crate::error::{GameSimError, Result};
use crate::game::{GameType, Move, PayoffCalculator};
use crate::history::PairingRecord;
use crate::provider::DecisionProvider;
use crate::record::{RecordSink, Recorder};
use crate::scenario::ScenarioCatalog;

pub use gossip::GOSSIP_PROBABILITY;
pub use pairing::{draw_round_count, select_game_type};
pub use stats::{is_cooperative, RunStats};

/// Borrowed view of everything one pairing needs besides its two agents.
pub(crate) struct Env<'a, P, R> {
    pub(crate) config: &'a ExperimentConfig,
    pub(crate) provider: &'a P,
    pub(crate) catalog: &'a ScenarioCatalog,
    pub(crate) calculator: PayoffCalculator,
    pub(crate) sink: &'a mut RecordSink,
    pub(crate) rng: &'a mut R,
}

/// Per-agent part of the aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Strategy the agent was built from.
    pub strategy: String,
    /// Model identifier.
    pub model: String,
    /// Moves decided.
    pub total_games: u32,
    /// Sum of payoffs received.
    pub total_payoff: i64,
    /// Canonical move → times played.
    pub strategies_used: BTreeMap<Move, u32>,
    /// Provider calls.
    pub api_calls: u32,
    /// Moves that fell back to the safe default.
    pub fallback_moves: u32,
    /// Provider calls replaced by a default.
    pub provider_errors: u32,
    /// Memories at the end of the run, keyed by peer.
    pub final_memories: BTreeMap<String, String>,
}

impl AgentSummary {
    fn of(agent: &Agent) -> Self {
        let stats = agent.stats();
        Self {
            strategy: agent.strategy().to_string(),
            model: agent.model().to_string(),
            total_games: stats.total_games,
            total_payoff: stats.total_payoff,
            strategies_used: stats.strategies_used.clone(),
            api_calls: stats.api_calls,
            fallback_moves: stats.fallback_moves,
            provider_errors: stats.provider_errors,
            final_memories: agent.memories().clone(),
        }
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Run identifier.
    pub run_id: String,
    /// Completed pairings.
    pub total_pairings: u32,
    /// Completed rounds.
    pub total_rounds: u32,
    /// Provider calls summed over all agents.
    pub total_api_calls: u64,
    /// Share of cooperative moves, coordination options always counting.
    pub cooperation_rate: f64,
    /// Share of cooperative moves, coordination moves counting only when
    /// both players matched.
    pub coop_ewan: f64,
    /// Game → `"moveA-moveB"` → count.
    pub moves_by_game: BTreeMap<GameType, BTreeMap<String, u32>>,
    /// Agent id → summary.
    pub agent_summaries: BTreeMap<String, AgentSummary>,
    /// Record writes that failed.
    #[serde(default)]
    pub record_failures: u32,
}

/// Replicate each spec `frequency` times as `{strategy}_{index}_{replica}`.
pub fn build_agent_pool(specs: &[AgentSpec], config: &ExperimentConfig, dry_run: bool) -> Vec<Agent> {
    specs
        .iter()
        .enumerate()
        .flat_map(|(idx, spec)| {
            (0..spec.frequency).map(move |i| {
                Agent::from_config(
                    format!("{}_{}_{}", spec.strategy_name, idx, i),
                    spec,
                    config,
                    dry_run,
                )
            })
        })
        .collect()
}

/// `StdRng` seeded from `seed`, or from OS entropy.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// A run in progress.
pub struct Simulation<P, R = StdRng> {
    run_id: String,
    config: ExperimentConfig,
    provider: P,
    rng: R,
    catalog: ScenarioCatalog,
    calculator: PayoffCalculator,
    sink: RecordSink,
    agents: Vec<Agent>,
    stats: RunStats,
}

impl<P: DecisionProvider, R: Rng> Simulation<P, R> {
    /// Validate `config` and every spec's frequency, build the agent pool
    /// and prepare a run that records nothing until
    /// [`Simulation::with_recorder`] is called.
    pub fn new(
        specs: &[AgentSpec],
        config: ExperimentConfig,
        provider: P,
        rng: R,
        dry_run: bool,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(spec) = specs.iter().find(|s| s.frequency < 1) {
            return Err(GameSimError::invalid_value(
                format!("frequency ({})", spec.strategy_name),
                spec.frequency.to_string(),
                "must be at least 1",
            ));
        }
        let agents = build_agent_pool(specs, &config, dry_run);
        if agents.len() < 2 {
            return Err(GameSimError::InsufficientAgents(agents.len()));
        }
        info!("Initialized {} agents", agents.len());

        Ok(Self {
            run_id: Uuid::new_v4().to_string(),
            config,
            provider,
            rng,
            catalog: ScenarioCatalog::builtin(),
            calculator: PayoffCalculator::new(),
            sink: RecordSink::default(),
            agents,
            stats: RunStats::default(),
        })
    }

    /// Send events to `recorder`.
    pub fn with_recorder(mut self, recorder: impl Recorder + Send + 'static) -> Self {
        self.sink = RecordSink::new(recorder);
        self
    }

    /// Replace the built-in scenarios.
    pub fn with_catalog(mut self, catalog: ScenarioCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use a caller-chosen run id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Experiment parameters.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Agent pool.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Decision provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Counters so far.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Sample two distinct agents and play one pairing.
    pub async fn run_next_pairing(&mut self) -> Result<PairingRecord> {
        let pairing_id = self.stats.total_pairings;
        let picked = rand::seq::index::sample(&mut self.rng, self.agents.len(), 2);
        let (first, second) = (picked.index(0), picked.index(1));

        let mut env = Env {
            config: &self.config,
            provider: &self.provider,
            catalog: &self.catalog,
            calculator: self.calculator,
            sink: &mut self.sink,
            rng: &mut self.rng,
        };

        let (a, b) = pair_mut(&mut self.agents, first, second);
        let record = pairing::run_pairing(&mut env, pairing_id, a, b).await?;

        if env.config.allow_gossip {
            let delivered =
                gossip::exchange(&mut env, pairing_id, &mut self.agents, first, second).await;
            debug!(pairing = pairing_id, "delivered {} gossip messages", delivered);
        }

        self.sink.pairing_completed(&record);
        self.stats.total_pairings += 1;
        for round in &record.rounds {
            self.stats.record_round(round);
        }
        Ok(record)
    }

    /// Play every remaining pairing, then finalize the recorder.
    pub async fn run(&mut self) -> Result<SimulationResult> {
        info!(
            run_id = %self.run_id,
            "Starting simulation with {} pairings",
            self.config.total_pairings
        );
        while self.stats.total_pairings < self.config.total_pairings {
            let record = self.run_next_pairing().await?;
            info!(
                "Completed pairing {}/{} ({} rounds)",
                record.pairing_id + 1,
                self.config.total_pairings,
                record.rounds.len()
            );
        }

        let result = self.result();
        self.sink.finalize(&result);
        info!(
            "Simulation complete: {} rounds, {} API calls, cooperation rate {:.3}",
            result.total_rounds,
            result.total_api_calls,
            result.cooperation_rate
        );
        Ok(SimulationResult {
            record_failures: self.sink.failures(),
            ..result
        })
    }

    /// Aggregate result from the current state.
    pub fn result(&self) -> SimulationResult {
        SimulationResult {
            run_id: self.run_id.clone(),
            total_pairings: self.stats.total_pairings,
            total_rounds: self.stats.total_rounds,
            total_api_calls: self
                .agents
                .iter()
                .map(|a| u64::from(a.stats().api_calls))
                .sum(),
            cooperation_rate: self.stats.cooperation_rate(),
            coop_ewan: self.stats.coop_ewan(),
            moves_by_game: self.stats.moves_by_game.clone(),
            agent_summaries: self
                .agents
                .iter()
                .map(|a| (a.id().to_string(), AgentSummary::of(a)))
                .collect(),
            record_failures: self.sink.failures(),
        }
    }
}

impl<P, R> std::fmt::Debug for Simulation<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("run_id", &self.run_id)
            .field("agents", &self.agents.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Two distinct mutable agents.
fn pair_mut(agents: &mut [Agent], i: usize, j: usize) -> (&mut Agent, &mut Agent) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = agents.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = agents.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}
