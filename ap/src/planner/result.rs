//! Inputs and outputs of one planning call

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PlanError;
use crate::governor::TerminationReason;
use crate::search::{Action, Estimate, PlanningState, SearchNode, StateId};

/// Hard limits for one planning call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Node expansions before the search stops
    pub max_nodes: u64,
    /// Wall-clock deadline for the whole call
    pub max_time: Duration,
    /// Depth at which a node is no longer expanded
    pub max_depth: u32,
}

impl Budget {
    pub fn new(max_nodes: u64, max_time: Duration, max_depth: u32) -> Self {
        Self {
            max_nodes,
            max_time,
            max_depth,
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.max_nodes == 0 {
            return Err(PlanError::InvalidBudget("max-nodes must be at least 1".to_string()));
        }
        if self.max_time.is_zero() {
            return Err(PlanError::InvalidBudget("max-time must be non-zero".to_string()));
        }
        if self.max_depth == 0 {
            return Err(PlanError::InvalidBudget("max-depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// The state a plan ends in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub id: StateId,
    pub depth: u32,
    pub g_score: u64,
    pub h_score: Estimate,
    pub f_score: Estimate,
    pub plan_complete: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub observation: String,
}

impl StateSnapshot {
    pub(crate) fn capture(state: &PlanningState, node: &SearchNode) -> Self {
        Self {
            id: state.id,
            depth: state.depth,
            g_score: state.g_score,
            h_score: node.h_score,
            f_score: node.f_score,
            plan_complete: state.plan_complete,
            observation: state.current_observation.clone(),
        }
    }
}

/// Counters collected during a search
///
/// No wall-clock values: two runs against the same scripted oracles
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub iterations: u64,
    pub nodes_expanded: u64,
    pub nodes_generated: u64,
    pub duplicates_skipped: u64,
    pub candidates_filtered: u64,
    pub frontier_evictions: u64,
    pub frontier_high_water: usize,
    pub action_oracle_dead_ends: u64,
    pub heuristic_unknowns: u64,
    pub distinct_action_types: usize,
    pub max_depth_seen: u32,
    pub replan_attempts: u32,
}

/// Outcome of `find_optimal_plan`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResult {
    pub task_description: String,
    pub actions: Vec<Action>,
    pub terminal_state: StateSnapshot,
    pub termination_reason: TerminationReason,
    pub stats: SearchStats,
}

impl PlanResult {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn total_cost(&self) -> u64 {
        self.actions.iter().map(|a| a.cost).sum()
    }

    pub fn reached_goal(&self) -> bool {
        self.termination_reason == TerminationReason::GoalReached
    }
}
