//! Decision providers.
//!
//! A decision provider turns a prompt into free text. The engine never looks
//! inside a provider; it only relies on this contract:
//!
//! - the request carries a [`CallType`] tag next to the prompt
//! - the reply is free text that may contain one private segment wrapped in
//!   `<thinking>...</thinking>`, which [`split_thinking`] separates from the
//!   visible text
//! - failures surface as an error, and the caller decides the fallback
//!
//! Implementations: [`HttpProvider`] (chat completions over HTTP),
//! [`DryRunProvider`] (fixed canonical answers) and [`ScriptedProvider`]
//! (queued answers for tests).

mod http;
mod scripted;

use std::fmt;
use std::future::Future;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use http::{ExponentialBackoff, HttpProvider, RetryPolicy};
pub use scripted::ScriptedProvider;

lazy_static! {
    /// Private thinking segment, across newlines
    static ref THINKING: Regex =
        Regex::new(r"(?s)<thinking>(.*?)</thinking>").expect("static pattern compiles");
}

/// Purpose of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// A message to the current opponent.
    Communication,
    /// The move choice for a round.
    MoveDecision,
    /// End-of-pairing memory note about the opponent.
    MemoryUpdate,
    /// A statement about a past opponent for a third agent.
    GossipGeneration,
    /// Reconciling received gossip with memory.
    GossipProcessing,
}

impl CallType {
    /// Every call type.
    pub const ALL: [CallType; 5] = [
        CallType::Communication,
        CallType::MoveDecision,
        CallType::MemoryUpdate,
        CallType::GossipGeneration,
        CallType::GossipProcessing,
    ];

    /// Tag used in logs and records.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Communication => "communication",
            CallType::MoveDecision => "move_decision",
            CallType::MemoryUpdate => "memory_update",
            CallType::GossipGeneration => "gossip_generation",
            CallType::GossipProcessing => "gossip_processing",
        }
    }

    /// Text substituted when the provider fails.
    pub fn fallback_response(&self) -> &'static str {
        match self {
            CallType::MoveDecision => "cooperate",
            _ => "",
        }
    }

    /// Fixed answer used in dry-run mode.
    pub fn dry_run_response(&self) -> String {
        match self {
            CallType::MoveDecision => "cooperate".to_string(),
            other => format!("[Dry run response for {}]", other.as_str()),
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Calling agent.
    pub agent_id: String,
    /// Model identifier.
    pub model: String,
    /// Strategy prompt, sent as the system message.
    pub system_prompt: String,
    /// Call-specific prompt.
    pub prompt: String,
    /// Purpose of the call.
    pub call_type: CallType,
}

/// Turns a request into free text.
pub trait DecisionProvider: Send + Sync {
    /// Complete one request.
    fn complete(&self, request: &DecisionRequest) -> impl Future<Output = Result<String>> + Send;
}

impl<P: DecisionProvider> DecisionProvider for &P {
    fn complete(&self, request: &DecisionRequest) -> impl Future<Output = Result<String>> + Send {
        (**self).complete(request)
    }
}

/// Provider that answers every call with [`CallType::dry_run_response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProvider;

impl DecisionProvider for DryRunProvider {
    async fn complete(&self, request: &DecisionRequest) -> Result<String> {
        Ok(request.call_type.dry_run_response())
    }
}

/// Provider output split into its visible and private parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Text delivered to the other side and logged as the response.
    pub visible: String,
    /// Content of the first thinking segment, if any.
    pub thinking: Option<String>,
}

/// Separate the private thinking segment from the visible text.
///
/// Every `<thinking>` segment is removed from the visible text; the first
/// one is reported. If nothing visible remains, the thinking text stands in
/// for it.
///
/// ```
/// use gamesim::provider::split_thinking;
///
/// let reply = split_thinking("<thinking>They defected last time.</thinking> defect");
/// assert_eq!(reply.visible, "defect");
/// assert_eq!(reply.thinking.as_deref(), Some("They defected last time."));
/// ```
pub fn split_thinking(raw: &str) -> Reply {
    let thinking = THINKING
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut visible = THINKING.replace_all(raw, "").trim().to_string();
    if visible.is_empty() {
        if let Some(t) = &thinking {
            visible = t.clone();
        }
    }

    Reply { visible, thinking }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_thinking() {
        let reply = split_thinking("  Let's both maintain prices. ");
        assert_eq!(reply.visible, "Let's both maintain prices.");
        assert!(reply.thinking.is_none());
    }

    #[test]
    fn test_split_multiline_and_repeated_segments() {
        let raw = "<thinking>line one\nline two</thinking>Hello<thinking>again</thinking> there";
        let reply = split_thinking(raw);
        assert_eq!(reply.visible, "Hello there");
        assert_eq!(reply.thinking.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_thinking_only_becomes_visible() {
        let reply = split_thinking("<thinking> stag </thinking>");
        assert_eq!(reply.visible, "stag");
        assert_eq!(reply.thinking.as_deref(), Some("stag"));
    }

    #[test]
    fn test_unclosed_tag_is_visible() {
        let reply = split_thinking("<thinking>never closed");
        assert_eq!(reply.visible, "<thinking>never closed");
        assert!(reply.thinking.is_none());
    }

    #[test]
    fn test_call_type_defaults() {
        assert_eq!(CallType::MoveDecision.fallback_response(), "cooperate");
        assert_eq!(CallType::GossipGeneration.fallback_response(), "");
        assert_eq!(
            CallType::MemoryUpdate.dry_run_response(),
            "[Dry run response for memory_update]"
        );
        assert_eq!(CallType::MoveDecision.dry_run_response(), "cooperate");
    }

    #[tokio::test]
    async fn test_dry_run_provider() {
        let request = DecisionRequest {
            agent_id: "a".to_string(),
            model: "gpt-4".to_string(),
            system_prompt: String::new(),
            prompt: "choose".to_string(),
            call_type: CallType::Communication,
        };
        let text = DryRunProvider.complete(&request).await.unwrap();
        assert_eq!(text, "[Dry run response for communication]");
    }
}
