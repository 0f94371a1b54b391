//! HeuristicOracle - estimates remaining cost to the goal

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::parse::parse_estimate;
use super::prompts::{ESTIMATE_SYSTEM, PromptRenderer};
use crate::config::OracleConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::search::{Estimate, PlanningState};

/// Estimates cost-to-goal for a state
///
/// Returns `Estimate::Unknown` when no estimate could be obtained at all.
#[async_trait]
pub trait HeuristicOracle: Send + Sync {
    async fn estimate(&self, state: &PlanningState) -> Estimate;
}

/// HeuristicOracle backed by the generation service
pub struct LlmHeuristicOracle {
    client: Arc<dyn LlmClient>,
    prompts: PromptRenderer,
    config: OracleConfig,
}

impl LlmHeuristicOracle {
    pub fn new(client: Arc<dyn LlmClient>, config: OracleConfig) -> Self {
        debug!(?config, "LlmHeuristicOracle::new: called");
        Self {
            client,
            prompts: PromptRenderer::new(),
            config,
        }
    }

    async fn request(&self, state: &PlanningState) -> Result<Option<String>, LlmError> {
        let user = self.prompts.estimate(state)?;
        let completion = CompletionRequest::single(ESTIMATE_SYSTEM, user, self.config.estimate_max_tokens);
        let timeout = self.config.request_timeout();
        let response = tokio::time::timeout(timeout, self.client.complete(completion))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;
        debug!(
            state = %state.id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LlmHeuristicOracle::request: response received"
        );
        Ok(response.content)
    }
}

#[async_trait]
impl HeuristicOracle for LlmHeuristicOracle {
    async fn estimate(&self, state: &PlanningState) -> Estimate {
        debug!(state = %state.id, "LlmHeuristicOracle::estimate: called");
        match self.request(state).await {
            Ok(text) => match text.as_deref().and_then(parse_estimate) {
                Some(h) => Estimate::Finite(h),
                None => {
                    debug!(state = %state.id, ?text, "LlmHeuristicOracle::estimate: no integer, using fallback");
                    Estimate::Finite(self.config.unparsable_estimate)
                }
            },
            Err(e) => {
                warn!(state = %state.id, kind = e.kind(), error = %e, "LlmHeuristicOracle::estimate: request failed");
                Estimate::Unknown
            }
        }
    }
}
