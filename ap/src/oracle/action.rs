//! ActionOracle - proposes next actions from a planning state

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::parse::{ProposalParse, parse_proposals};
use super::prompts::{PROPOSE_SYSTEM, PromptRenderer};
use crate::config::OracleConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::search::{Action, PlanningState};
use crate::tools::ToolSpec;

/// A proposed next action, before it becomes part of a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub tool: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub cost_hint: Option<u64>,
    #[serde(default)]
    pub plan_complete: bool,
    #[serde(default)]
    pub expected_observation: Option<String>,
}

impl ActionCandidate {
    pub fn new(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            input: input.into(),
            cost_hint: None,
            plan_complete: false,
            expected_observation: None,
        }
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost_hint = Some(cost);
        self
    }

    pub fn completing(mut self) -> Self {
        self.plan_complete = true;
        self
    }

    pub fn observing(mut self, observation: impl Into<String>) -> Self {
        self.expected_observation = Some(observation.into());
        self
    }

    /// The action this candidate would apply (cost hint clamped)
    pub fn to_action(&self) -> Action {
        Action::new(self.tool.clone(), self.input.clone())
            .with_cost_hint(self.cost_hint)
            .completing(self.plan_complete)
    }
}

/// Everything the oracle sees for one proposal
#[derive(Debug, Clone, Copy)]
pub struct ProposalRequest<'a> {
    pub state: &'a PlanningState,
    pub tools: &'a [ToolSpec],
    pub max_candidates: usize,
    /// Risk categories the planner will filter out
    pub avoid: &'a [String],
}

/// Proposes candidate next actions
///
/// Implementations never fail: any problem yields an empty list, which turns
/// the node into a dead end.
#[async_trait]
pub trait ActionOracle: Send + Sync {
    async fn propose_actions(&self, request: ProposalRequest<'_>) -> Vec<ActionCandidate>;
}

/// ActionOracle backed by the generation service
pub struct LlmActionOracle {
    client: Arc<dyn LlmClient>,
    prompts: PromptRenderer,
    config: OracleConfig,
}

impl LlmActionOracle {
    pub fn new(client: Arc<dyn LlmClient>, config: OracleConfig) -> Self {
        debug!(?config, "LlmActionOracle::new: called");
        Self {
            client,
            prompts: PromptRenderer::new(),
            config,
        }
    }

    /// One generation round-trip, parsed
    async fn attempt(&self, request: &ProposalRequest<'_>, strict: bool) -> Result<ProposalParse, LlmError> {
        let user = self.prompts.propose(
            request.state,
            request.tools,
            request.avoid,
            request.max_candidates,
            self.config.history_window,
            strict,
        )?;
        let completion = CompletionRequest::single(PROPOSE_SYSTEM, user, self.config.propose_max_tokens);

        let timeout = self.config.request_timeout();
        let response = tokio::time::timeout(timeout, self.client.complete(completion))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;
        debug!(
            strict,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LlmActionOracle::attempt: response received"
        );

        Ok(match response.content {
            Some(text) => parse_proposals(&text, request.tools),
            None => ProposalParse::Empty,
        })
    }
}

#[async_trait]
impl ActionOracle for LlmActionOracle {
    async fn propose_actions(&self, request: ProposalRequest<'_>) -> Vec<ActionCandidate> {
        debug!(state = %request.state.id, depth = request.state.depth, "LlmActionOracle::propose_actions: called");

        for strict in [false, true] {
            match self.attempt(&request, strict).await {
                Ok(ProposalParse::Candidates(mut candidates)) => {
                    candidates.truncate(request.max_candidates);
                    debug!(count = candidates.len(), strict, "LlmActionOracle::propose_actions: parsed candidates");
                    return candidates;
                }
                Ok(ProposalParse::Empty) => {
                    warn!(state = %request.state.id, strict, "LlmActionOracle::propose_actions: empty response");
                }
                Ok(ProposalParse::Malformed(reason)) => {
                    warn!(state = %request.state.id, strict, %reason, "LlmActionOracle::propose_actions: malformed response");
                }
                Err(e) => {
                    warn!(state = %request.state.id, strict, kind = e.kind(), error = %e, "LlmActionOracle::propose_actions: request failed");
                }
            }
        }

        debug!(state = %request.state.id, "LlmActionOracle::propose_actions: giving up, dead end");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::search::StateArena;
    use std::time::Duration;

    fn tools() -> Vec<ToolSpec> {
        vec![ToolSpec::new("search_flights", ""), ToolSpec::new("book_flight", "")]
    }

    fn oracle(client: Arc<MockLlmClient>) -> LlmActionOracle {
        LlmActionOracle::new(client, OracleConfig::default())
    }

    async fn propose(oracle: &LlmActionOracle, max_candidates: usize) -> Vec<ActionCandidate> {
        propose_with(oracle, &tools(), max_candidates).await
    }

    async fn propose_with(oracle: &LlmActionOracle, tools: &[ToolSpec], max_candidates: usize) -> Vec<ActionCandidate> {
        let mut arena = StateArena::new();
        let root = arena.create_initial("book a flight");
        oracle
            .propose_actions(ProposalRequest {
                state: &arena[root],
                tools,
                max_candidates,
                avoid: &[],
            })
            .await
    }

    #[test]
    fn test_candidate_to_action() {
        let action = ActionCandidate::new("book_flight", "UA1").with_cost(500).completing().to_action();
        assert_eq!(action.cost, 100);
        assert!(action.plan_complete);
        assert_eq!(action.descriptor(), "book_flight(UA1)");
    }

    #[tokio::test]
    async fn test_first_response_parsed() {
        let client = Arc::new(MockLlmClient::texts(&[
            r#"[{"tool": "search_flights", "input": "SFO"}, {"tool": "book_flight", "input": "1"}]"#,
        ]));
        let candidates = propose(&oracle(client.clone()), 5).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_without_catalogue_any_tool_is_proposed() {
        let client = Arc::new(MockLlmClient::texts(&[r#"[{"tool":"search_flights","input":"SFO"}]"#]));
        let candidates = propose_with(&oracle(client.clone()), &[], 5).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tool, "search_flights");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_truncated_to_max_candidates() {
        let client = Arc::new(MockLlmClient::texts(&[
            r#"[{"tool": "search_flights", "input": "SFO"}, {"tool": "book_flight", "input": "1"}]"#,
        ]));
        assert_eq!(propose(&oracle(client), 1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_with_strict_instruction_after_malformed() {
        let client = Arc::new(MockLlmClient::texts(&["I think you should search", r#"[{"tool": "search_flights"}]"#]));
        let candidates = propose(&oracle(client.clone()), 5).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(client.call_count(), 2);

        let requests = client.requests();
        assert!(!requests[0].user_text().contains("IMPORTANT"));
        assert!(requests[1].user_text().contains("Reply with ONLY the JSON array"));
    }

    #[tokio::test]
    async fn test_retry_after_service_error() {
        let client = Arc::new(MockLlmClient::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(1))),
            Ok(crate::llm::CompletionResponse::text(r#"[{"tool": "book_flight"}]"#)),
        ]));
        assert_eq!(propose(&oracle(client), 5).await.len(), 1);
    }

    #[tokio::test]
    async fn test_two_failures_give_empty_list() {
        let client = Arc::new(MockLlmClient::texts(&["", "still not json"]));
        let candidates = propose(&oracle(client.clone()), 5).await;
        assert!(candidates.is_empty());
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_service_gives_empty_list() {
        let client = Arc::new(MockLlmClient::new(vec![]));
        assert!(propose(&oracle(client.clone()), 5).await.is_empty());
        assert_eq!(client.call_count(), 2);
    }
}
