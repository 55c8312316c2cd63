//! Deterministic provider for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use super::{CallType, DecisionProvider, DecisionRequest};
use crate::error::{GameSimError, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Failure(String),
}

/// Provider that replays queued answers per call type.
///
/// When a call type's queue is empty the provider answers with that call
/// type's default (set with [`ScriptedProvider::with_default`]) or, failing
/// that, the dry-run answer. Every request is kept for inspection.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<CallType, VecDeque<Scripted>>>,
    defaults: HashMap<CallType, String>,
    requests: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedProvider {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer used once the queue for `call_type` is drained.
    pub fn with_default(mut self, call_type: CallType, text: impl Into<String>) -> Self {
        self.defaults.insert(call_type, text.into());
        self
    }

    /// Queue one answer.
    pub fn push(&self, call_type: CallType, text: impl Into<String>) -> &Self {
        self.enqueue(call_type, Scripted::Text(text.into()));
        self
    }

    /// Queue one failure.
    pub fn push_failure(&self, call_type: CallType, message: impl Into<String>) -> &Self {
        self.enqueue(call_type, Scripted::Failure(message.into()));
        self
    }

    fn enqueue(&self, call_type: CallType, item: Scripted) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(call_type)
            .or_default()
            .push_back(item);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests of one call type.
    pub fn calls(&self, call_type: CallType) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.call_type == call_type)
            .count()
    }

    fn next(&self, request: &DecisionRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let queued = self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&request.call_type)
            .and_then(VecDeque::pop_front);

        match queued {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(GameSimError::Provider(message)),
            None => Ok(self
                .defaults
                .get(&request.call_type)
                .cloned()
                .unwrap_or_else(|| request.call_type.dry_run_response())),
        }
    }
}

impl DecisionProvider for ScriptedProvider {
    async fn complete(&self, request: &DecisionRequest) -> Result<String> {
        self.next(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(call_type: CallType) -> DecisionRequest {
        DecisionRequest {
            agent_id: "tft_0_0".to_string(),
            model: "gpt-4".to_string(),
            system_prompt: "Mirror".to_string(),
            prompt: "Choose".to_string(),
            call_type,
        }
    }

    #[tokio::test]
    async fn test_queue_then_default() {
        let provider = ScriptedProvider::new().with_default(CallType::MoveDecision, "defect");
        provider
            .push(CallType::MoveDecision, "cut prices")
            .push_failure(CallType::MoveDecision, "boom");

        let req = request(CallType::MoveDecision);
        assert_eq!(provider.complete(&req).await.unwrap(), "cut prices");
        assert!(provider.complete(&req).await.is_err());
        assert_eq!(provider.complete(&req).await.unwrap(), "defect");
        assert_eq!(provider.calls(CallType::MoveDecision), 3);
    }

    #[tokio::test]
    async fn test_unscripted_call_uses_dry_run_answer() {
        let provider = ScriptedProvider::new();
        let text = provider.complete(&request(CallType::GossipGeneration)).await.unwrap();
        assert_eq!(text, "[Dry run response for gossip_generation]");
        assert_eq!(provider.requests().len(), 1);
    }
}
