//! AStarPlanner - best-first search over hypothetical task states
//!
//! One call owns its arena, frontier and visited set; nothing survives the
//! call except the experience store behind the adjuster. The orchestrating
//! task is the only writer of the frontier. Sibling scoring runs through an
//! order-preserving buffered stream, so insertion order (and with it the
//! tie-break sequence) never depends on which heuristic call returns first.

use futures::stream::{self, StreamExt};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Instant as Deadline;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::result::{Budget, PlanResult, SearchStats, StateSnapshot};
use crate::config::{GovernorConfig, SearchConfig};
use crate::error::PlanError;
use crate::experience::EpisodicHeuristicAdjuster;
use crate::governor::{GovernorSignal, IterationMetrics, ProgressGovernor, TerminationReason};
use crate::oracle::{ActionOracle, HeuristicOracle, ProposalRequest};
use crate::search::{Estimate, Frontier, PlanningState, SearchNode, StateArena, StateId, VisitedSet, state_signature};
use crate::tools::ToolSpec;
use crate::validation::RiskCatalog;

pub struct AStarPlanner {
    action_oracle: Arc<dyn ActionOracle>,
    heuristic_oracle: Arc<dyn HeuristicOracle>,
    adjuster: Option<Arc<EpisodicHeuristicAdjuster>>,
    risk_catalog: RiskCatalog,
    search: SearchConfig,
    governor: GovernorConfig,
}

impl AStarPlanner {
    pub fn new(
        action_oracle: Arc<dyn ActionOracle>,
        heuristic_oracle: Arc<dyn HeuristicOracle>,
        search: SearchConfig,
        governor: GovernorConfig,
    ) -> Self {
        debug!(?search, ?governor, "AStarPlanner::new: called");
        Self {
            action_oracle,
            heuristic_oracle,
            adjuster: None,
            risk_catalog: RiskCatalog::empty(),
            search,
            governor,
        }
    }

    /// Rescale every heuristic estimate with recorded experience
    pub fn with_adjuster(mut self, adjuster: Arc<EpisodicHeuristicAdjuster>) -> Self {
        self.adjuster = Some(adjuster);
        self
    }

    /// Catalogue used to drop candidates in excluded risk categories
    pub fn with_risk_catalog(mut self, catalog: RiskCatalog) -> Self {
        self.risk_catalog = catalog;
        self
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub async fn find_optimal_plan(
        &self,
        task_description: &str,
        available_tools: &[ToolSpec],
        budget: Budget,
    ) -> Result<PlanResult, PlanError> {
        self.find_optimal_plan_with_cancel(task_description, available_tools, budget, CancellationToken::new())
            .await
    }

    /// Like `find_optimal_plan`; cancelling the token returns the best partial plan
    pub async fn find_optimal_plan_with_cancel(
        &self,
        task_description: &str,
        available_tools: &[ToolSpec],
        budget: Budget,
        cancel: CancellationToken,
    ) -> Result<PlanResult, PlanError> {
        self.search_plan(task_description, available_tools, budget, &[], &cancel)
            .await
    }

    fn check_entry(&self, task_description: &str, budget: &Budget) -> Result<(), PlanError> {
        budget.validate()?;
        if task_description.trim().is_empty() {
            return Err(PlanError::InvalidRequest("task description is empty".to_string()));
        }
        let s = &self.search;
        if s.frontier_capacity == 0 {
            return Err(PlanError::InvalidConfig("frontier-capacity must be at least 1".to_string()));
        }
        if s.scoring_workers == 0 || s.max_candidates == 0 {
            return Err(PlanError::InvalidConfig(
                "scoring-workers and max-candidates must be at least 1".to_string(),
            ));
        }
        if s.call_timeout_ms == 0 {
            return Err(PlanError::InvalidConfig("call-timeout-ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// The search loop; `avoid` names risk categories whose candidates are dropped
    pub(crate) async fn search_plan(
        &self,
        task_description: &str,
        tools: &[ToolSpec],
        budget: Budget,
        avoid: &[String],
        cancel: &CancellationToken,
    ) -> Result<PlanResult, PlanError> {
        debug!(%task_description, tools = tools.len(), ?budget, ?avoid, "AStarPlanner::search_plan: called");
        self.check_entry(task_description, &budget)?;

        let started = Instant::now();
        let deadline = Deadline::now() + budget.max_time;
        let call_timeout = self.search.call_timeout();
        let mut governor = ProgressGovernor::new(&self.governor, &budget);
        let mut run = SearchRun::new(self.search.frontier_capacity);

        let root = run.arena.create_initial(task_description);
        run.visited.insert(state_signature(&[], ""));
        // The root is expanded first whatever its estimate, so it is not scored
        let root_node = SearchNode::new(root, 0, Estimate::Finite(0), 0);
        run.frontier.push(root_node);

        info!(%task_description, max_nodes = budget.max_nodes, max_depth = budget.max_depth, "Planning started");

        let mut goal: Option<SearchNode> = None;
        loop {
            if cancel.is_cancelled() {
                governor.cancelled();
                break;
            }

            let Some(node) = run.frontier.pop() else {
                let reason = if run.best.is_some() {
                    TerminationReason::FrontierExhausted
                } else {
                    TerminationReason::NoPlanFound
                };
                debug!(%reason, "AStarPlanner::search_plan: frontier empty");
                governor.halt(reason);
                break;
            };
            run.stats.iterations += 1;

            let state = &run.arena[node.state];
            debug!(state = %state.id, depth = state.depth, f = %node.f_score, "AStarPlanner::search_plan: popped");
            if state.plan_complete {
                governor.goal_reached();
                goal = Some(node);
                break;
            }
            if state.depth >= budget.max_depth {
                governor.halt(TerminationReason::MaxDepthReached);
                break;
            }

            run.stats.nodes_expanded += 1;
            let request = ProposalRequest {
                state,
                tools,
                max_candidates: self.search.max_candidates,
                avoid,
            };
            let proposed = tokio::time::timeout(call_timeout, self.action_oracle.propose_actions(request));
            let candidates = match guarded(proposed, cancel, deadline).await {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(_)) => {
                    warn!(state = %node.state, "AStarPlanner::search_plan: action oracle timed out");
                    Vec::new()
                }
                Err(reason) => {
                    governor.halt(reason);
                    break;
                }
            };
            if candidates.is_empty() {
                run.stats.action_oracle_dead_ends += 1;
            }

            let mut children = Vec::new();
            for candidate in candidates.into_iter().take(self.search.max_candidates) {
                let action = candidate.to_action();
                if self.risk_catalog.matches_any(&action, avoid) {
                    debug!(%action, "AStarPlanner::search_plan: candidate in excluded risk category");
                    run.stats.candidates_filtered += 1;
                    continue;
                }
                let observation = candidate.expected_observation.unwrap_or_default();
                let mut history = run.arena[node.state].action_history.clone();
                history.push(action.clone());
                if !run.visited.insert(state_signature(&history, &observation)) {
                    debug!(%action, "AStarPlanner::search_plan: duplicate state");
                    run.stats.duplicates_skipped += 1;
                    continue;
                }
                children.push(run.arena.expand(node.state, action, observation));
            }

            let arena = &run.arena;
            let scoring = stream::iter(children.iter().map(|&id| self.score(&arena[id])))
                .buffered(self.search.scoring_workers)
                .collect::<Vec<Estimate>>();
            let scores = match guarded(scoring, cancel, deadline).await {
                Ok(scores) => scores,
                Err(reason) => {
                    governor.halt(reason);
                    break;
                }
            };

            for (&id, h) in children.iter().zip(scores) {
                run.insert_child(id, h);
            }

            let metrics = IterationMetrics {
                best_f: run.frontier.peek().map_or(Estimate::Unknown, |n| n.f_score),
                diversity: run.action_types.len(),
                elapsed: started.elapsed(),
                nodes_expanded: run.stats.nodes_expanded,
            };
            if let GovernorSignal::Halt(reason) = governor.observe(metrics) {
                debug!(%reason, "AStarPlanner::search_plan: governor halted search");
                break;
            }
        }

        let termination_reason = governor.finish().unwrap_or(TerminationReason::FrontierExhausted);
        let terminal = goal.or(run.best).unwrap_or(root_node);
        let result = run.into_result(task_description, terminal, termination_reason);

        info!(
            reason = %result.termination_reason,
            actions = result.actions.len(),
            nodes_expanded = result.stats.nodes_expanded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Planning finished"
        );
        Ok(result)
    }

    /// Heuristic estimate for one child, corrected by experience when enabled
    async fn score(&self, state: &PlanningState) -> Estimate {
        let base = match tokio::time::timeout(self.search.call_timeout(), self.heuristic_oracle.estimate(state)).await {
            Ok(estimate) => estimate,
            Err(_) => {
                warn!(state = %state.id, "AStarPlanner::score: heuristic oracle timed out");
                Estimate::Unknown
            }
        };
        match &self.adjuster {
            Some(adjuster) => adjuster.adjust(base, state),
            None => base,
        }
    }
}

/// Run `fut` unless the caller cancels or the session deadline passes first
async fn guarded<F: Future>(fut: F, cancel: &CancellationToken, deadline: Deadline) -> Result<F::Output, TerminationReason> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TerminationReason::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Err(TerminationReason::BudgetExhausted),
        out = fut => Ok(out),
    }
}

/// Per-call search state
struct SearchRun {
    arena: StateArena,
    frontier: Frontier,
    visited: VisitedSet,
    stats: SearchStats,
    /// Tool names of every generated child
    action_types: BTreeSet<String>,
    /// Best non-root node generated so far
    best: Option<SearchNode>,
    seq: u64,
}

impl SearchRun {
    fn new(frontier_capacity: usize) -> Self {
        Self {
            arena: StateArena::new(),
            frontier: Frontier::new(frontier_capacity),
            visited: VisitedSet::new(),
            stats: SearchStats::default(),
            action_types: BTreeSet::new(),
            best: None,
            seq: 0,
        }
    }

    fn insert_child(&mut self, id: StateId, h: Estimate) {
        let state = &self.arena[id];
        self.seq += 1;
        let node = SearchNode::new(id, state.g_score, h, self.seq);

        if h.is_unknown() {
            self.stats.heuristic_unknowns += 1;
        }
        if let Some(action) = state.last_action() {
            self.action_types.insert(action.tool.clone());
        }
        self.stats.nodes_generated += 1;
        self.stats.max_depth_seen = self.stats.max_depth_seen.max(state.depth);
        if self.best.is_none_or(|best| best_key(&node) < best_key(&best)) {
            self.best = Some(node);
        }

        let evicted = self.frontier.push(node);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "SearchRun::insert_child: frontier evicted nodes");
        }
    }

    fn into_result(self, task_description: &str, terminal: SearchNode, termination_reason: TerminationReason) -> PlanResult {
        let actions = self
            .arena
            .reconstruct_path(terminal.state)
            .into_iter()
            .filter_map(|id| self.arena[id].last_action().cloned())
            .collect();
        let terminal_state = StateSnapshot::capture(&self.arena[terminal.state], &terminal);

        let mut stats = self.stats;
        stats.frontier_evictions = self.frontier.evicted();
        stats.frontier_high_water = self.frontier.high_water();
        stats.distinct_action_types = self.action_types.len();

        PlanResult {
            task_description: task_description.to_string(),
            actions,
            terminal_state,
            termination_reason,
            stats,
        }
    }
}

/// Ranking of partial plans: closest to the goal, then cheapest overall,
/// then deepest, then earliest
fn best_key(node: &SearchNode) -> (Estimate, Estimate, Reverse<u64>, u64) {
    (node.h_score, node.f_score, Reverse(node.g_score), node.seq)
}
