//! One pairing: round count, then per round game selection, communication,
//! simultaneous decision and payoff, then the end-of-pairing memory update.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_distr::Poisson;
use tracing::{debug, info};

use super::Env;
use crate::agent::{Agent, RoundContext};
use crate::config::{ExperimentConfig, GameWeights};
use crate::error::{GameSimError, Result};
use crate::game::GameType;
use crate::history::{Message, Outcome, PairingRecord, RoundRecord};
use crate::provider::{CallType, DecisionProvider};
use crate::record::Event;
use crate::scenario::Scenario;

/// Rounds for one pairing: `avg_rounds` when fixed, else a Poisson draw
/// with that mean. Never less than 1.
pub fn draw_round_count(config: &ExperimentConfig, rng: &mut impl Rng) -> u32 {
    if config.rounds_fixed {
        return config.avg_rounds.max(1);
    }
    match Poisson::new(f64::from(config.avg_rounds)) {
        Ok(poisson) => {
            let draw: f64 = poisson.sample(rng);
            (draw as u32).max(1)
        },
        Err(_) => 1,
    }
}

/// Weighted draw over the closed set of game types.
pub fn select_game_type(weights: &GameWeights, rng: &mut impl Rng) -> Result<GameType> {
    let (games, w): (Vec<GameType>, Vec<f64>) = weights.iter().unzip();
    let dist = WeightedIndex::new(&w)
        .map_err(|e| GameSimError::Config(format!("invalid game proportions: {e}")))?;
    Ok(games[dist.sample(rng)])
}

/// Play one pairing between `a` and `b` and return its closed record.
///
/// Provider failures never surface here: agents absorb them.
pub(crate) async fn run_pairing<P, R>(
    env: &mut Env<'_, P, R>,
    pairing_id: u32,
    a: &mut Agent,
    b: &mut Agent,
) -> Result<PairingRecord>
where
    P: DecisionProvider,
    R: Rng,
{
    let config = env.config;
    let catalog = env.catalog;
    let provider = env.provider;

    let a_id = a.id().to_string();
    let b_id = b.id().to_string();
    let mut record = PairingRecord::new(pairing_id, a_id.as_str(), b_id.as_str());

    let rounds = draw_round_count(config, &mut *env.rng);
    let held_game = if config.game_varies_across_pairings {
        None
    } else {
        Some(select_game_type(&config.game_proportions, &mut *env.rng)?)
    };
    info!(
        pairing = pairing_id,
        "Pairing {} vs {} for {} rounds",
        a_id,
        b_id,
        rounds
    );

    let mut held_scenarios: BTreeMap<GameType, &Scenario> = BTreeMap::new();

    for round in 1..=rounds {
        let game = match held_game {
            Some(game) => game,
            None => select_game_type(&config.game_proportions, &mut *env.rng)?,
        };
        let scenario = if config.scenario_varies_across_rounds {
            catalog.pick(game, &mut *env.rng)?
        } else if let Some(scenario) = held_scenarios.get(&game) {
            *scenario
        } else {
            let scenario = catalog.pick(game, &mut *env.rng)?;
            held_scenarios.insert(game, scenario);
            scenario
        };
        debug!(pairing = pairing_id, round, %game, "scenario: {}", scenario.name);

        let mut messages: Vec<Message> = Vec::new();
        for _ in 0..config.max_communication_rounds {
            speak(env, pairing_id, round, a, &b_id, scenario, &record.rounds, &mut messages).await;
            speak(env, pairing_id, round, b, &a_id, scenario, &record.rounds, &mut messages).await;
        }

        // both decide on the same transcript; neither sees the other's move
        let ctx_a = RoundContext {
            opponent_id: &b_id,
            scenario,
            history: &record.rounds,
        };
        let move_a = a.decide_move(provider, &ctx_a, &messages).await;
        let ctx_b = RoundContext {
            opponent_id: &a_id,
            scenario,
            history: &record.rounds,
        };
        let move_b = b.decide_move(provider, &ctx_b, &messages).await;

        env.sink
            .thinking(pairing_id, Some(round), &a_id, CallType::MoveDecision, move_a.thinking);
        env.sink
            .thinking(pairing_id, Some(round), &b_id, CallType::MoveDecision, move_b.thinking);

        let (payoff_a, payoff_b) = env.calculator.payoffs(game, move_a.value, move_b.value);
        a.record_payoff(payoff_a);
        b.record_payoff(payoff_b);

        for (agent_id, choice, payoff) in [
            (&a_id, move_a.value, payoff_a),
            (&b_id, move_b.value, payoff_b),
        ] {
            env.sink.emit(Event::Move {
                pairing_id,
                round,
                agent_id: agent_id.clone(),
                game_type: game,
                choice,
            });
            env.sink.emit(Event::Payoff {
                pairing_id,
                round,
                agent_id: agent_id.clone(),
                game_type: game,
                payoff,
            });
        }

        info!(
            pairing = pairing_id,
            round,
            "{}: {} ({}) vs {} ({}) -> ({}, {})",
            game,
            a_id,
            move_a.value,
            b_id,
            move_b.value,
            payoff_a,
            payoff_b
        );

        record.rounds.push(RoundRecord {
            round,
            game_type: game,
            scenario: scenario.name.clone(),
            messages,
            outcomes: [
                Outcome {
                    agent_id: a_id.clone(),
                    choice: move_a.value,
                    payoff: payoff_a,
                },
                Outcome {
                    agent_id: b_id.clone(),
                    choice: move_b.value,
                    payoff: payoff_b,
                },
            ],
            timestamp: Utc::now(),
        });
    }

    remember(env, pairing_id, a, &b_id, &record.rounds).await;
    remember(env, pairing_id, b, &a_id, &record.rounds).await;

    record.close();
    Ok(record)
}

#[allow(clippy::too_many_arguments)]
async fn speak<P, R>(
    env: &mut Env<'_, P, R>,
    pairing_id: u32,
    round: u32,
    speaker: &mut Agent,
    listener_id: &str,
    scenario: &Scenario,
    history: &[RoundRecord],
    messages: &mut Vec<Message>,
) where
    P: DecisionProvider,
    R: Rng,
{
    let ctx = RoundContext {
        opponent_id: listener_id,
        scenario,
        history,
    };
    let said = speaker.communicate(env.provider, &ctx, messages).await;
    env.sink.thinking(
        pairing_id,
        Some(round),
        speaker.id(),
        CallType::Communication,
        said.thinking,
    );

    let Some(text) = said.value else {
        return;
    };
    env.sink.emit(Event::Communication {
        pairing_id,
        round,
        sender_id: speaker.id().to_string(),
        receiver_id: listener_id.to_string(),
        message: text.clone(),
    });
    messages.push(Message {
        sender: speaker.id().to_string(),
        receiver: listener_id.to_string(),
        text,
    });
}

async fn remember<P, R>(
    env: &mut Env<'_, P, R>,
    pairing_id: u32,
    agent: &mut Agent,
    opponent_id: &str,
    rounds: &[RoundRecord],
) where
    P: DecisionProvider,
    R: Rng,
{
    let thinking = agent
        .update_memory_after_pairing(env.provider, opponent_id, rounds)
        .await;
    env.sink
        .thinking(pairing_id, None, agent.id(), CallType::MemoryUpdate, thinking);

    if let Some(memory) = agent.memory(opponent_id) {
        env.sink.emit(Event::Memory {
            pairing_id,
            agent_id: agent.id().to_string(),
            about_agent_id: opponent_id.to_string(),
            memory: memory.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSpec;
    use crate::game::{Move, PayoffCalculator};
    use crate::provider::ScriptedProvider;
    use crate::record::{MemoryRecorder, RecordSink};
    use crate::scenario::ScenarioCatalog;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn agent(id: &str) -> Agent {
        Agent::new(id, &AgentSpec::new("tester", "Play fair."))
    }

    #[test]
    fn test_fixed_round_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = ExperimentConfig {
            avg_rounds: 4,
            ..ExperimentConfig::default()
        };
        for _ in 0..20 {
            assert_eq!(draw_round_count(&config, &mut rng), 4);
        }
    }

    #[test]
    fn test_zero_weight_games_never_drawn() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let weights = GameWeights::only(GameType::PrisonersDilemma);
        for _ in 0..1000 {
            assert_eq!(
                select_game_type(&weights, &mut rng).unwrap(),
                GameType::PrisonersDilemma
            );
        }
    }

    #[test]
    fn test_weighted_draw_covers_positive_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let weights = GameWeights::parse("pd:1,sh:1,hd:0,coord:2").unwrap();
        let mut seen = BTreeMap::new();
        for _ in 0..2000 {
            *seen
                .entry(select_game_type(&weights, &mut rng).unwrap())
                .or_insert(0u32) += 1;
        }
        assert!(!seen.contains_key(&GameType::HawkDove));
        assert!(seen[&GameType::Coordination] > seen[&GameType::StagHunt]);
        assert_eq!(seen.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_poisson_round_count_at_least_one(mean in 1u32..50, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let config = ExperimentConfig {
                avg_rounds: mean,
                rounds_fixed: false,
                ..ExperimentConfig::default()
            };
            for _ in 0..20 {
                prop_assert!(draw_round_count(&config, &mut rng) >= 1);
            }
        }
    }

    #[tokio::test]
    async fn test_pairing_records_rounds_and_memories() {
        let config = ExperimentConfig {
            avg_rounds: 2,
            max_communication_rounds: 1,
            game_proportions: GameWeights::only(GameType::PrisonersDilemma),
            ..ExperimentConfig::default()
        };
        let provider = ScriptedProvider::new()
            .with_default(CallType::Communication, "Let's both hold prices.")
            .with_default(CallType::MemoryUpdate, "Held prices every time.");
        provider
            .push(CallType::MoveDecision, "I will cooperate")
            .push(CallType::MoveDecision, "<thinking>Greedy.</thinking>I defect");
        let catalog = ScenarioCatalog::builtin();
        let recorder = MemoryRecorder::new();
        let mut sink = RecordSink::new(recorder.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut env = Env {
            config: &config,
            provider: &provider,
            catalog: &catalog,
            calculator: PayoffCalculator::new(),
            sink: &mut sink,
            rng: &mut rng,
        };

        let mut a = agent("tester_0_0");
        let mut b = agent("tester_0_1");
        let record = run_pairing(&mut env, 0, &mut a, &mut b).await.unwrap();

        assert_eq!(record.rounds.len(), 2);
        assert!(record.ended_at.is_some());
        let first = &record.rounds[0];
        assert_eq!(first.move_of("tester_0_0"), Some(Move::Cooperate));
        assert_eq!(first.move_of("tester_0_1"), Some(Move::Defect));
        assert_eq!(first.payoff_of("tester_0_0"), Some(0));
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].sender, "tester_0_0");

        assert_eq!(a.memory("tester_0_1"), Some("Held prices every time."));
        assert_eq!(b.memory("tester_0_0"), Some("Held prices every time."));
        assert_eq!(b.stats().total_payoff, 5 + 3);

        let events = recorder.events();
        let count = |pred: fn(&Event) -> bool| events.iter().filter(|e| pred(e)).count();
        assert_eq!(count(|e| matches!(e, Event::Move { .. })), 4);
        assert_eq!(count(|e| matches!(e, Event::Payoff { .. })), 4);
        assert_eq!(count(|e| matches!(e, Event::Communication { .. })), 4);
        assert_eq!(count(|e| matches!(e, Event::Memory { .. })), 2);
        assert_eq!(count(|e| matches!(e, Event::Thinking { .. })), 1);
    }

    #[tokio::test]
    async fn test_held_game_and_scenario() {
        let config = ExperimentConfig {
            avg_rounds: 6,
            max_communication_rounds: 0,
            game_varies_across_pairings: false,
            scenario_varies_across_rounds: false,
            ..ExperimentConfig::default()
        };
        let provider = ScriptedProvider::new();
        let catalog = ScenarioCatalog::builtin();
        let mut sink = RecordSink::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut env = Env {
            config: &config,
            provider: &provider,
            catalog: &catalog,
            calculator: PayoffCalculator::new(),
            sink: &mut sink,
            rng: &mut rng,
        };

        let mut a = agent("a_0_0");
        let mut b = agent("b_1_0");
        let record = run_pairing(&mut env, 3, &mut a, &mut b).await.unwrap();

        let first = &record.rounds[0];
        assert!(record
            .rounds
            .iter()
            .all(|r| r.game_type == first.game_type && r.scenario == first.scenario));
        assert_eq!(provider.calls(CallType::Communication), 0);
        assert!(record.rounds.iter().all(|r| r.messages.is_empty()));
    }
}
