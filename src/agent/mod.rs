//! Agents: one strategy identity with private memory and statistics.
//!
//! Every decision an agent makes goes through a [`DecisionProvider`]. The
//! agent owns the prompt for each [`CallType`], strips private thinking from
//! the reply, and turns provider failures into the call type's safe default,
//! so none of its operations can fail.
//!
//! Memories are keyed by peer id, overwritten on update and capped at
//! `memory_limit` characters. Only the agent's own methods write them.

mod extract;
mod prompt;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AgentSpec, ExperimentConfig};
use crate::game::Move;
use crate::history::{Message, RoundRecord};
use crate::provider::{split_thinking, CallType, DecisionProvider, DecisionRequest, Reply};
use crate::scenario::Scenario;

pub use extract::{extract_move, keyword_rules, Extraction};

/// Minimum length of a gossip-processing reply that replaces memory.
const MIN_GOSSIP_UPDATE_CHARS: usize = 10;

/// Cumulative per-agent counters. Never reset within a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Moves decided.
    pub total_games: u32,
    /// Sum of payoffs received.
    pub total_payoff: i64,
    /// Canonical move → times played.
    pub strategies_used: BTreeMap<Move, u32>,
    /// Provider calls, dry-run calls included.
    pub api_calls: u32,
    /// Moves that fell back to the game's safe default.
    pub fallback_moves: u32,
    /// Provider calls that failed and were replaced by a default.
    pub provider_errors: u32,
}

/// What an agent sees of the current round.
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    /// Opponent in this pairing.
    pub opponent_id: &'a str,
    /// Scenario for the round.
    pub scenario: &'a Scenario,
    /// Completed rounds of this pairing.
    pub history: &'a [RoundRecord],
}

/// A decision together with any private thinking that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<T> {
    /// The decision itself.
    pub value: T,
    /// Private thinking segment, if the provider produced one.
    pub thinking: Option<String>,
}

/// A player.
#[derive(Debug, Clone)]
pub struct Agent {
    id: String,
    strategy: String,
    system_prompt: String,
    model: String,
    memory_limit: usize,
    allow_thinking: bool,
    dry_run: bool,
    memories: BTreeMap<String, String>,
    stats: AgentStats,
}

impl Agent {
    /// Agent with default limits (500-character memories, thinking allowed,
    /// live provider calls).
    pub fn new(id: impl Into<String>, spec: &AgentSpec) -> Self {
        Self {
            id: id.into(),
            strategy: spec.strategy_name.clone(),
            system_prompt: spec.system_prompt.clone(),
            model: spec.model.clone(),
            memory_limit: ExperimentConfig::default().memory_limit,
            allow_thinking: true,
            dry_run: false,
            memories: BTreeMap::new(),
            stats: AgentStats::default(),
        }
    }

    /// Agent configured from the experiment parameters.
    pub fn from_config(
        id: impl Into<String>,
        spec: &AgentSpec,
        config: &ExperimentConfig,
        dry_run: bool,
    ) -> Self {
        Self::new(id, spec)
            .with_memory_limit(config.memory_limit)
            .with_thinking(config.allow_thinking)
            .with_dry_run(dry_run)
    }

    /// Set the memory character cap.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Allow or forbid the thinking hint in prompts.
    pub fn with_thinking(mut self, allow: bool) -> Self {
        self.allow_thinking = allow;
        self
    }

    /// Answer every call with the fixed dry-run response.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Unique id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Strategy name this agent was built from.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Memory character cap.
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Memory about `peer`, if any.
    pub fn memory(&self, peer: &str) -> Option<&str> {
        self.memories.get(peer).map(String::as_str)
    }

    /// All memories, keyed by peer id.
    pub fn memories(&self) -> &BTreeMap<String, String> {
        &self.memories
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Add a round payoff to the running total.
    pub fn record_payoff(&mut self, payoff: i32) {
        self.stats.total_payoff += i64::from(payoff);
    }

    /// Produce a message for the opponent. An empty reply yields no message.
    pub async fn communicate<P: DecisionProvider>(
        &mut self,
        provider: &P,
        ctx: &RoundContext<'_>,
        messages: &[Message],
    ) -> Decision<Option<String>> {
        let prompt = prompt::communication(self, ctx, messages);
        let reply = self.call(provider, CallType::Communication, prompt).await;
        Decision {
            value: Some(reply.visible).filter(|m| !m.is_empty()),
            thinking: reply.thinking,
        }
    }

    /// Choose a canonical move for the round's game.
    pub async fn decide_move<P: DecisionProvider>(
        &mut self,
        provider: &P,
        ctx: &RoundContext<'_>,
        messages: &[Message],
    ) -> Decision<Move> {
        let prompt = prompt::move_decision(self, ctx, messages);
        let reply = self.call(provider, CallType::MoveDecision, prompt).await;

        let game = ctx.scenario.game_type;
        let extraction = extract_move(&reply.visible, game, &ctx.scenario.move_mapping);
        if extraction.fallback {
            self.stats.fallback_moves += 1;
            warn!(
                agent = %self.id,
                game = %game,
                "could not extract move from '{}', using {}",
                truncate_chars(&reply.visible, 100),
                extraction.choice
            );
        }

        self.stats.total_games += 1;
        *self.stats.strategies_used.entry(extraction.choice).or_default() += 1;

        Decision {
            value: extraction.choice,
            thinking: reply.thinking,
        }
    }

    /// Rewrite the memory about `opponent_id` from a finished pairing.
    /// Returns the private thinking, if any.
    pub async fn update_memory_after_pairing<P: DecisionProvider>(
        &mut self,
        provider: &P,
        opponent_id: &str,
        history: &[RoundRecord],
    ) -> Option<String> {
        let prompt = prompt::memory_update(self, opponent_id, history);
        let reply = self.call(provider, CallType::MemoryUpdate, prompt).await;

        let memory = truncate_chars(&reply.visible, self.memory_limit);
        info!(
            agent = %self.id,
            about = opponent_id,
            "updated memory: {}",
            truncate_chars(&memory, 100)
        );
        self.memories.insert(opponent_id.to_string(), memory);
        reply.thinking
    }

    /// Say something about `about_id` to `to_id`. Without a memory about
    /// `about_id` there is nothing to tell and the provider is not called.
    pub async fn generate_gossip<P: DecisionProvider>(
        &mut self,
        provider: &P,
        about_id: &str,
        to_id: &str,
    ) -> Decision<Option<String>> {
        if !self.memories.contains_key(about_id) {
            return Decision {
                value: None,
                thinking: None,
            };
        }
        let prompt = prompt::gossip_generation(self, about_id, to_id);
        let reply = self.call(provider, CallType::GossipGeneration, prompt).await;
        Decision {
            value: Some(reply.visible).filter(|g| !g.is_empty()),
            thinking: reply.thinking,
        }
    }

    /// Weigh gossip from `from_id` about `about_id`. Memory is replaced only
    /// when the reply has real content.
    pub async fn receive_gossip<P: DecisionProvider>(
        &mut self,
        provider: &P,
        from_id: &str,
        about_id: &str,
        gossip: &str,
    ) -> Option<String> {
        let prompt = prompt::gossip_processing(self, from_id, about_id, gossip);
        let reply = self.call(provider, CallType::GossipProcessing, prompt).await;

        if reply.visible.chars().count() > MIN_GOSSIP_UPDATE_CHARS {
            let memory = truncate_chars(&reply.visible, self.memory_limit);
            self.memories.insert(about_id.to_string(), memory);
        } else {
            debug!(agent = %self.id, about = about_id, "gossip left memory unchanged");
        }
        reply.thinking
    }

    async fn call<P: DecisionProvider>(
        &mut self,
        provider: &P,
        call_type: CallType,
        prompt: String,
    ) -> Reply {
        self.stats.api_calls += 1;

        if self.dry_run {
            debug!(
                agent = %self.id,
                %call_type,
                "[DRY RUN] prompt: {}...",
                truncate_chars(&prompt, 200)
            );
            return Reply {
                visible: call_type.dry_run_response(),
                thinking: None,
            };
        }

        let request = DecisionRequest {
            agent_id: self.id.clone(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            prompt,
            call_type,
        };
        debug!(agent = %self.id, %call_type, "prompt: {}", request.prompt);

        match provider.complete(&request).await {
            Ok(raw) => {
                let reply = split_thinking(&raw);
                if let Some(thinking) = &reply.thinking {
                    debug!(agent = %self.id, %call_type, "thinking: {thinking}");
                }
                reply
            },
            Err(e) => {
                self.stats.provider_errors += 1;
                warn!(
                    agent = %self.id,
                    %call_type,
                    error = %e,
                    "provider call failed, using safe default"
                );
                Reply {
                    visible: call_type.fallback_response().to_string(),
                    thinking: None,
                }
            },
        }
    }
}

/// First `limit` characters of `text`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
