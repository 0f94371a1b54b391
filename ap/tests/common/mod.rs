//! Scripted oracles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use astarplanner::oracle::{ActionCandidate, ActionOracle, HeuristicOracle, ProposalRequest};
use astarplanner::search::{Estimate, PlanningState};

/// Tool of the state's latest action, "" for the root
pub fn last_tool(state: &PlanningState) -> &str {
    state.last_action().map(|a| a.tool.as_str()).unwrap_or("")
}

/// Proposals keyed by the tool of the latest action
#[derive(Default)]
pub struct ScriptedActions {
    script: HashMap<String, Vec<ActionCandidate>>,
    fallback: Vec<ActionCandidate>,
}

impl ScriptedActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, tool: &str, candidates: Vec<ActionCandidate>) -> Self {
        self.script.insert(tool.to_string(), candidates);
        self
    }

    pub fn otherwise(mut self, candidates: Vec<ActionCandidate>) -> Self {
        self.fallback = candidates;
        self
    }

    /// A linear script: root proposes `tools[0]`, `tools[i]` proposes `tools[i + 1]`
    pub fn chain(tools: &[&str]) -> Self {
        let mut scripted = Self::new();
        let mut previous = "";
        for (i, tool) in tools.iter().enumerate() {
            let candidate = if i + 1 == tools.len() {
                ActionCandidate::new(*tool, "").completing()
            } else {
                ActionCandidate::new(*tool, "")
            };
            scripted = scripted.after(previous, vec![candidate]);
            previous = *tool;
        }
        scripted
    }
}

#[async_trait]
impl ActionOracle for ScriptedActions {
    async fn propose_actions(&self, request: ProposalRequest<'_>) -> Vec<ActionCandidate> {
        self.script
            .get(last_tool(request.state))
            .unwrap_or(&self.fallback)
            .clone()
    }
}

/// Estimates keyed by the tool of the latest action
pub struct ScriptedEstimates {
    script: HashMap<String, u64>,
    fallback: Estimate,
    delay: Option<Duration>,
}

impl ScriptedEstimates {
    pub fn new(pairs: &[(&str, u64)]) -> Self {
        Self {
            script: pairs.iter().map(|(t, h)| (t.to_string(), *h)).collect(),
            fallback: Estimate::Finite(10),
            delay: None,
        }
    }

    pub fn constant(h: u64) -> Self {
        Self {
            script: HashMap::new(),
            fallback: Estimate::Finite(h),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl HeuristicOracle for ScriptedEstimates {
    async fn estimate(&self, state: &PlanningState) -> Estimate {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .get(last_tool(state))
            .map(|h| Estimate::Finite(*h))
            .unwrap_or(self.fallback)
    }
}

/// Never completes; each call yields `width` brand-new tools
pub struct EndlessActions {
    width: u64,
    counter: AtomicU64,
}

impl EndlessActions {
    pub fn new(width: u64) -> Self {
        Self {
            width,
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ActionOracle for EndlessActions {
    async fn propose_actions(&self, _request: ProposalRequest<'_>) -> Vec<ActionCandidate> {
        (0..self.width)
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                ActionCandidate::new(format!("step_{}", n), "")
            })
            .collect()
    }
}

/// Proposes one step until `stall_depth`, then never answers
pub struct StallingActions {
    pub stall_depth: u32,
}

#[async_trait]
impl ActionOracle for StallingActions {
    async fn propose_actions(&self, request: ProposalRequest<'_>) -> Vec<ActionCandidate> {
        if request.state.depth >= self.stall_depth {
            std::future::pending::<()>().await;
        }
        vec![ActionCandidate::new(format!("step_{}", request.state.depth), "")]
    }
}
