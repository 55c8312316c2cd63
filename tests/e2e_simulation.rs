//! End-to-end simulation tests.
//!
//! These run whole simulations through the public API, with the dry-run
//! and scripted providers standing in for a real model endpoint.

use std::fs;
use std::path::{Path, PathBuf};

use gamesim::analysis::AnalysisReport;
use gamesim::provider::ScriptedProvider;
use gamesim::record::{Event, RunSummary};
use gamesim::{
    AgentSpec, CallType, CsvRecorder, DryRunProvider, ExperimentConfig, GameType, GameWeights,
    MemoryRecorder, Move, Simulation, SimulationResult,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn specs() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new("tit_for_tat", "Start cooperative, then mirror your opponent."),
        AgentSpec::new("always_defect", "Always act in your own interest."),
    ]
}

fn single_game(game: GameType, rounds: u32) -> ExperimentConfig {
    ExperimentConfig {
        total_pairings: 1,
        avg_rounds: rounds,
        rounds_fixed: true,
        allow_gossip: false,
        max_communication_rounds: 1,
        game_proportions: GameWeights::only(game),
        ..ExperimentConfig::default()
    }
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect()
}

/// Dry run of one prisoner's dilemma pairing
#[tokio::test]
async fn test_dry_run_prisoners_dilemma() {
    let recorder = MemoryRecorder::new();
    let mut sim = Simulation::new(
        &specs(),
        single_game(GameType::PrisonersDilemma, 2),
        DryRunProvider,
        StdRng::seed_from_u64(7),
        true,
    )
    .unwrap()
    .with_recorder(recorder.clone());

    let result = sim.run().await.unwrap();

    assert_eq!(result.total_pairings, 1);
    assert_eq!(result.total_rounds, 2);
    assert_eq!(result.cooperation_rate, 1.0);
    assert_eq!(result.coop_ewan, 1.0);
    assert_eq!(
        result.moves_by_game[&GameType::PrisonersDilemma]["cooperate-cooperate"],
        2
    );

    // Per agent: one message and one decision per round, then one memory
    assert_eq!(result.total_api_calls, 10);
    for summary in result.agent_summaries.values() {
        assert_eq!(summary.total_games, 2);
        assert_eq!(summary.total_payoff, 6);
        assert_eq!(summary.strategies_used[&Move::Cooperate], 2);
        assert_eq!(summary.final_memories.len(), 1);
    }

    let moves = recorder.events_where(|e| matches!(e, Event::Move { .. }));
    let payoffs = recorder.events_where(|e| matches!(e, Event::Payoff { .. }));
    let messages = recorder.events_where(|e| matches!(e, Event::Communication { .. }));
    assert_eq!(moves.len(), 4);
    assert_eq!(payoffs.len(), 4);
    assert_eq!(messages.len(), 4);
    assert_eq!(recorder.pairings().len(), 1);
    assert_eq!(recorder.result().unwrap(), result);
}

/// Both players pick hawk; memories are capped at the configured length
#[tokio::test]
async fn test_scripted_hawk_dove_with_memory_cap() {
    let provider = ScriptedProvider::new()
        .with_default(CallType::MoveDecision, "hawk")
        .with_default(
            CallType::MemoryUpdate,
            "Aggressive from the first round and never backed down once.",
        );
    let config = ExperimentConfig {
        memory_limit: 10,
        max_communication_rounds: 0,
        ..single_game(GameType::HawkDove, 1)
    };

    let mut sim =
        Simulation::new(&specs(), config, provider, StdRng::seed_from_u64(3), false).unwrap();
    let result = sim.run().await.unwrap();

    assert_eq!(result.cooperation_rate, 0.0);
    assert_eq!(result.moves_by_game[&GameType::HawkDove]["hawk-hawk"], 1);
    for summary in result.agent_summaries.values() {
        assert_eq!(summary.total_payoff, -1);
        for memory in summary.final_memories.values() {
            assert_eq!(memory, "Aggressive");
        }
    }

    assert_eq!(sim.provider().calls(CallType::MoveDecision), 2);
    assert_eq!(sim.provider().calls(CallType::MemoryUpdate), 2);
    assert_eq!(sim.provider().calls(CallType::Communication), 0);
}

/// A failing provider call still yields a move and is counted
#[tokio::test]
async fn test_provider_failure_falls_back() {
    let provider = ScriptedProvider::new().with_default(CallType::MoveDecision, "defect");
    provider.push_failure(CallType::MoveDecision, "connection reset");
    let config = ExperimentConfig {
        max_communication_rounds: 0,
        ..single_game(GameType::PrisonersDilemma, 1)
    };

    let mut sim =
        Simulation::new(&specs(), config, provider, StdRng::seed_from_u64(11), false).unwrap();
    let result = sim.run().await.unwrap();

    // First mover's call failed and fell back to cooperate; second defected
    assert_eq!(
        result.moves_by_game[&GameType::PrisonersDilemma]["cooperate-defect"],
        1
    );
    let errors: u32 = result.agent_summaries.values().map(|s| s.provider_errors).sum();
    assert_eq!(errors, 1);
    let payoffs: Vec<i64> = result.agent_summaries.values().map(|s| s.total_payoff).collect();
    assert!(payoffs.contains(&0));
    assert!(payoffs.contains(&5));
}

/// Same seed, same agents, same moves
#[tokio::test]
async fn test_seeded_runs_are_reproducible() {
    let config = ExperimentConfig {
        total_pairings: 4,
        avg_rounds: 3,
        rounds_fixed: false,
        allow_gossip: true,
        max_communication_rounds: 0,
        seed: Some(99),
        ..ExperimentConfig::default()
    };
    let specs = vec![
        AgentSpec::new("tit_for_tat", "Mirror.").with_frequency(2),
        AgentSpec::new("always_defect", "Defect."),
    ];

    let mut runs = Vec::new();
    for _ in 0..2 {
        let recorder = MemoryRecorder::new();
        let rng = gamesim::engine::seeded_rng(config.seed);
        let mut sim = Simulation::new(&specs, config.clone(), DryRunProvider, rng, true)
            .unwrap()
            .with_recorder(recorder.clone());
        let result = sim.run().await.unwrap();
        let moves = recorder.events_where(|e| matches!(e, Event::Move { .. }));
        runs.push((result.total_rounds, result.moves_by_game, moves));
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].2.len() as u32, runs[0].0 * 2);
}

/// File recorder writes every stream, the snapshot, summary and results
#[tokio::test]
async fn test_csv_recorder_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = CsvRecorder::create(dir.path(), "run-e2e").unwrap();
    let stamp = recorder.stamp().to_string();

    let mut sim = Simulation::new(
        &specs(),
        single_game(GameType::StagHunt, 2),
        DryRunProvider,
        StdRng::seed_from_u64(5),
        true,
    )
    .unwrap()
    .with_recorder(recorder)
    .with_run_id("run-e2e");
    let result = sim.run().await.unwrap();
    assert_eq!(result.record_failures, 0);
    let fallbacks: u32 = result.agent_summaries.values().map(|s| s.fallback_moves).sum();
    assert_eq!(fallbacks, 4);

    for stream in ["moves", "communications", "thinking", "memories", "gossip", "payoffs"] {
        let path = dir.path().join(format!("{stream}_{stamp}.csv"));
        assert!(path.exists(), "missing {}", path.display());
    }
    assert!(dir.path().join(format!("complete_log_{stamp}.json")).exists());

    let mut moves = csv::Reader::from_path(dir.path().join(format!("moves_{stamp}.csv"))).unwrap();
    let rows: Vec<csv::StringRecord> = moves.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| &r[4] == "stag_hunt"));

    let results = files_with_prefix(dir.path(), "results_");
    assert_eq!(results.len(), 1);
    let saved: SimulationResult =
        serde_json::from_str(&fs::read_to_string(&results[0]).unwrap()).unwrap();
    assert_eq!(saved.run_id, "run-e2e");
    assert_eq!(saved.total_rounds, 2);

    let summaries = files_with_prefix(dir.path(), "summary_");
    let summary: RunSummary =
        serde_json::from_str(&fs::read_to_string(&summaries[0]).unwrap()).unwrap();
    assert_eq!(summary.total_pairings, 1);
    // "cooperate" names no stag hunt option, so every move is the safe default
    assert_eq!(summary.moves_by_game["stag_hunt"]["stag"], 4);

    let report = AnalysisReport::load(dir.path()).unwrap();
    assert_eq!(report.total_moves, 4);
    assert_eq!(report.total_communications, 4);
}
