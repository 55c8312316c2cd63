//! Prompt construction, one builder per call type.

use super::{Agent, RoundContext};
use crate::history::{Message, RoundRecord};

const THINKING_HINT: &str = "\nYou may use <thinking>...</thinking> tags for private thoughts.";
const RECENT_ROUNDS: usize = 3;

fn push_transcript(parts: &mut Vec<String>, heading: &str, messages: &[Message]) {
    if messages.is_empty() {
        return;
    }
    parts.push(heading.to_string());
    for msg in messages {
        parts.push(format!("{}: {}", msg.sender, msg.text));
    }
}

fn recent(history: &[RoundRecord]) -> &[RoundRecord] {
    &history[history.len().saturating_sub(RECENT_ROUNDS)..]
}

fn move_or_unknown(round: &RoundRecord, agent_id: &str) -> String {
    round
        .move_of(agent_id)
        .map_or_else(|| "unknown".to_string(), |m| m.to_string())
}

pub(super) fn communication(agent: &Agent, ctx: &RoundContext<'_>, messages: &[Message]) -> String {
    let mut parts = vec![
        agent.system_prompt.clone(),
        format!("\nYour ID: {}", agent.id),
        format!("Opponent ID: {}", ctx.opponent_id),
        format!("\nCurrent Scenario:\n{}", ctx.scenario.description),
    ];

    if let Some(memory) = agent.memory(ctx.opponent_id).filter(|m| !m.is_empty()) {
        parts.push(format!("\nYour memory about {}:\n{}", ctx.opponent_id, memory));
    }
    if !ctx.history.is_empty() {
        parts.push(format!(
            "\nPrevious rounds with this opponent: {}",
            ctx.history.len()
        ));
    }
    push_transcript(&mut parts, "\nConversation so far:", messages);

    parts.push(
        "\nYou are now speaking DIRECTLY to your opponent. \
         Your entire response will be sent to them as-is. \
         Do not include any preamble, narration, or meta-commentary. Just write your message."
            .to_string(),
    );
    if agent.allow_thinking {
        parts.push(THINKING_HINT.to_string());
    }
    parts.join("\n")
}

pub(super) fn move_decision(agent: &Agent, ctx: &RoundContext<'_>, messages: &[Message]) -> String {
    let options = &ctx.scenario.options;
    let mut parts = vec![
        agent.system_prompt.clone(),
        format!("\nYour ID: {}", agent.id),
        format!("Opponent ID: {}", ctx.opponent_id),
        format!("\nScenario:\n{}", ctx.scenario.description),
        "\nYour options:".to_string(),
    ];
    parts.extend(options.iter().map(|o| format!("- {o}")));

    push_transcript(&mut parts, "\nCommunication phase:", messages);

    if !ctx.history.is_empty() {
        parts.push(format!(
            "\nYou have played {} previous rounds with this opponent.",
            ctx.history.len()
        ));
        for round in recent(ctx.history) {
            parts.push(format!(
                "Round {}: You chose {}, they chose {}",
                round.round,
                move_or_unknown(round, &agent.id),
                move_or_unknown(round, ctx.opponent_id)
            ));
        }
    }

    parts.push(format!("\nChoose one option from: {}", options.join(", ")));
    parts.push("Respond with ONLY your choice, no explanation.".to_string());
    if agent.allow_thinking {
        parts.push(
            "You may use <thinking>...</thinking> tags for private thoughts before your choice."
                .to_string(),
        );
    }
    parts.join("\n")
}

pub(super) fn memory_update(agent: &Agent, opponent_id: &str, history: &[RoundRecord]) -> String {
    let mut parts = vec![
        agent.system_prompt.clone(),
        format!("\nYou just finished playing with {opponent_id}."),
        format!("Total rounds played: {}", history.len()),
        "\nSummary of interactions:".to_string(),
    ];

    for round in history {
        parts.push(format!(
            "Round {} ({}): You chose {}, they chose {}, your payoff: {}",
            round.round,
            round.game_type,
            move_or_unknown(round, &agent.id),
            move_or_unknown(round, opponent_id),
            round
                .payoff_of(&agent.id)
                .map_or_else(|| "unknown".to_string(), |p| p.to_string())
        ));
    }

    if let Some(memory) = agent.memory(opponent_id) {
        parts.push(format!("\nYour previous memory about {opponent_id}:"));
        parts.push(memory.to_string());
    }

    parts.push(format!(
        "\nWrite a brief memory note about {opponent_id} based on this interaction. \
         Focus on their play style, trustworthiness, and any patterns you noticed. \
         Maximum {} characters.",
        agent.memory_limit
    ));
    if agent.allow_thinking {
        parts.push(THINKING_HINT.to_string());
    }
    parts.join("\n")
}

pub(super) fn gossip_generation(agent: &Agent, about_id: &str, to_id: &str) -> String {
    let mut parts = vec![
        agent.system_prompt.clone(),
        format!("\nYou have the opportunity to share information about {about_id} with {to_id}."),
        format!("\nYour memory about {about_id}:"),
        agent
            .memory(about_id)
            .unwrap_or("No prior interactions")
            .to_string(),
        format!(
            "\nYou are now speaking DIRECTLY to {to_id}. \
             Your entire response will be sent to them as-is. \
             Do not include any preamble, narration, or meta-commentary. \
             Just write what you want to say about {about_id}."
        ),
        "Keep it brief and consider your strategic goals.".to_string(),
        "You may choose to be honest, deceptive, or decline to share.".to_string(),
    ];
    if agent.allow_thinking {
        parts.push(THINKING_HINT.to_string());
    }
    parts.join("\n")
}

pub(super) fn gossip_processing(agent: &Agent, from_id: &str, about_id: &str, gossip: &str) -> String {
    let mut parts = vec![
        agent.system_prompt.clone(),
        format!("\n{from_id} told you about {about_id}:"),
        format!("\"{gossip}\""),
        format!("\nYour current memory about {about_id}:"),
        agent
            .memory(about_id)
            .unwrap_or("No prior interactions")
            .to_string(),
        format!("\nBased on this gossip and considering {from_id}'s potential motivations,"),
        format!("update your memory about {about_id}. Be skeptical of potentially biased information."),
        format!("Maximum {} characters.", agent.memory_limit),
    ];
    if agent.allow_thinking {
        parts.push(THINKING_HINT.to_string());
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSpec;
    use crate::game::{GameType, Move};
    use crate::history::Outcome;
    use crate::scenario::ScenarioCatalog;
    use chrono::Utc;

    fn agent() -> Agent {
        Agent::new("tft_0_0", &AgentSpec::new("tft", "Mirror your opponent."))
    }

    fn round(n: u32, mine: Move, theirs: Move) -> RoundRecord {
        RoundRecord {
            round: n,
            game_type: GameType::PrisonersDilemma,
            scenario: "Price Competition".to_string(),
            messages: Vec::new(),
            outcomes: [
                Outcome {
                    agent_id: "tft_0_0".to_string(),
                    choice: mine,
                    payoff: 3,
                },
                Outcome {
                    agent_id: "rival_1_0".to_string(),
                    choice: theirs,
                    payoff: 3,
                },
            ],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_move_prompt_shows_last_three_rounds() {
        let catalog = ScenarioCatalog::builtin();
        let scenario = &catalog.scenarios(GameType::PrisonersDilemma)[0];
        let history: Vec<_> = (1..=5)
            .map(|n| round(n, Move::Cooperate, Move::Defect))
            .collect();
        let ctx = RoundContext {
            opponent_id: "rival_1_0",
            scenario,
            history: &history,
        };
        let prompt = move_decision(&agent(), &ctx, &[]);

        assert!(prompt.starts_with("Mirror your opponent."));
        assert!(prompt.contains("You have played 5 previous rounds"));
        assert!(!prompt.contains("Round 2:"));
        assert!(prompt.contains("Round 3: You chose cooperate, they chose defect"));
        assert!(prompt.contains("Round 5:"));
        assert!(prompt.contains(&format!("- {}", scenario.options[0])));
        assert!(prompt.contains("<thinking>"));
        assert!(!prompt.contains("Communication phase"));
    }

    #[test]
    fn test_communication_prompt_includes_transcript() {
        let catalog = ScenarioCatalog::builtin();
        let scenario = &catalog.scenarios(GameType::StagHunt)[0];
        let ctx = RoundContext {
            opponent_id: "rival_1_0",
            scenario,
            history: &[],
        };
        let messages = vec![Message {
            sender: "rival_1_0".to_string(),
            receiver: "tft_0_0".to_string(),
            text: "Shall we invest together?".to_string(),
        }];
        let prompt = communication(&agent().with_thinking(false), &ctx, &messages);
        assert!(prompt.contains("Conversation so far:\nrival_1_0: Shall we invest together?"));
        assert!(prompt.contains(&scenario.description));
        assert!(!prompt.contains("<thinking>"));
        assert!(!prompt.contains("Previous rounds"));
    }

    #[test]
    fn test_memory_prompt_lists_every_round() {
        let history = vec![
            round(1, Move::Cooperate, Move::Cooperate),
            round(2, Move::Cooperate, Move::Defect),
        ];
        let prompt = memory_update(&agent().with_memory_limit(120), "rival_1_0", &history);
        assert!(prompt.contains("Total rounds played: 2"));
        assert!(prompt.contains(
            "Round 2 (prisoners_dilemma): You chose cooperate, they chose defect, your payoff: 3"
        ));
        assert!(prompt.contains("Maximum 120 characters."));
    }

    #[test]
    fn test_gossip_prompts_fall_back_to_no_memory() {
        let a = agent();
        let prompt = gossip_processing(&a, "x_2_0", "rival_1_0", "They always defect.");
        assert!(prompt.contains("x_2_0 told you about rival_1_0:\n\"They always defect.\""));
        assert!(prompt.contains("No prior interactions"));
        assert!(gossip_generation(&a, "rival_1_0", "x_2_0").contains("with x_2_0"));
    }
}
