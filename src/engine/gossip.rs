//! Post-pairing gossip.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use super::Env;
use crate::agent::{truncate_chars, Agent};
use crate::provider::{CallType, DecisionProvider};
use crate::record::Event;

/// Chance that a participant gossips after a pairing.
pub const GOSSIP_PROBABILITY: f64 = 0.5;

/// Each of the two participants independently may tell one random third
/// agent about the opponent it just played. Returns the number of gossip
/// messages delivered.
pub(crate) async fn exchange<P, R>(
    env: &mut Env<'_, P, R>,
    pairing_id: u32,
    agents: &mut [Agent],
    first: usize,
    second: usize,
) -> usize
where
    P: DecisionProvider,
    R: Rng,
{
    let candidates: Vec<usize> = (0..agents.len())
        .filter(|&idx| idx != first && idx != second)
        .collect();
    if candidates.is_empty() {
        return 0;
    }

    let mut delivered = 0;
    for (source, about) in [(first, second), (second, first)] {
        if !env.rng.gen_bool(GOSSIP_PROBABILITY) {
            continue;
        }
        let Some(&target) = candidates.choose(&mut *env.rng) else {
            continue;
        };

        let source_id = agents[source].id().to_string();
        let about_id = agents[about].id().to_string();
        let target_id = agents[target].id().to_string();

        let said = agents[source]
            .generate_gossip(env.provider, &about_id, &target_id)
            .await;
        env.sink.thinking(
            pairing_id,
            None,
            &source_id,
            CallType::GossipGeneration,
            said.thinking,
        );
        let Some(gossip) = said.value else {
            continue;
        };

        info!(
            "{} gossips to {} about {}: {}",
            source_id,
            target_id,
            about_id,
            truncate_chars(&gossip, 100)
        );
        env.sink.emit(Event::Gossip {
            sender_id: source_id.clone(),
            receiver_id: target_id.clone(),
            about_agent_id: about_id.clone(),
            gossip: gossip.clone(),
        });

        let thinking = agents[target]
            .receive_gossip(env.provider, &source_id, &about_id, &gossip)
            .await;
        env.sink
            .thinking(pairing_id, None, &target_id, CallType::GossipProcessing, thinking);
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSpec, ExperimentConfig};
    use crate::game::PayoffCalculator;
    use crate::provider::ScriptedProvider;
    use crate::record::{MemoryRecorder, RecordSink};
    use crate::scenario::ScenarioCatalog;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn agents(n: usize) -> Vec<Agent> {
        let spec = AgentSpec::new("gossiper", "Share what you know.");
        (0..n).map(|i| Agent::new(format!("gossiper_0_{i}"), &spec)).collect()
    }

    #[tokio::test]
    async fn test_no_third_agent_means_no_gossip() {
        let config = ExperimentConfig::default();
        let provider = ScriptedProvider::new();
        let catalog = ScenarioCatalog::builtin();
        let mut sink = RecordSink::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut env = Env {
            config: &config,
            provider: &provider,
            catalog: &catalog,
            calculator: PayoffCalculator::new(),
            sink: &mut sink,
            rng: &mut rng,
        };
        let mut pool = agents(2);
        assert_eq!(exchange(&mut env, 0, &mut pool, 0, 1).await, 0);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_gossip_reaches_only_third_agents() {
        let config = ExperimentConfig::default();
        let provider = ScriptedProvider::new()
            .with_default(CallType::MemoryUpdate, "Defected in round two.")
            .with_default(CallType::GossipGeneration, "Watch out, they defect late.")
            .with_default(CallType::GossipProcessing, "Heard they defect late; stay alert.");
        let catalog = ScenarioCatalog::builtin();
        let recorder = MemoryRecorder::new();
        let mut sink = RecordSink::new(recorder.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let mut pool = agents(4);
        pool[0]
            .update_memory_after_pairing(&provider, "gossiper_0_1", &[])
            .await;
        pool[1]
            .update_memory_after_pairing(&provider, "gossiper_0_0", &[])
            .await;

        let mut env = Env {
            config: &config,
            provider: &provider,
            catalog: &catalog,
            calculator: PayoffCalculator::new(),
            sink: &mut sink,
            rng: &mut rng,
        };
        let mut delivered = 0;
        for pairing_id in 0..20 {
            delivered += exchange(&mut env, pairing_id, &mut pool, 0, 1).await;
        }
        assert!(delivered > 0);

        let gossip = recorder.events_where(|e| matches!(e, Event::Gossip { .. }));
        assert_eq!(gossip.len(), delivered);
        for event in gossip {
            let Event::Gossip {
                sender_id,
                receiver_id,
                about_agent_id,
                ..
            } = event
            else {
                unreachable!()
            };
            assert!(receiver_id == "gossiper_0_2" || receiver_id == "gossiper_0_3");
            assert_ne!(sender_id, about_agent_id);
        }
        assert!(pool[2..].iter().any(|agent| !agent.memories().is_empty()));
    }
}
