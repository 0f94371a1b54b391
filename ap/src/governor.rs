//! ProgressGovernor - decides when a search should stop
//!
//! The governor sees one `IterationMetrics` sample per planner iteration.
//! Hard ceilings (nodes expanded, elapsed time) are checked first and always
//! win. Otherwise the last K finite best-f values are kept in a sliding
//! window; a full window that barely improved while the set of action types
//! stayed the same is a plateau.
//!
//! Phases: `Running -> Halted(reason) -> Terminated(reason)`. Leaving
//! `Running` is sticky.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GovernorConfig;
use crate::planner::Budget;
use crate::search::Estimate;

/// Why a search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    /// A state flagged `plan_complete` was popped
    GoalReached,
    /// Best f stopped improving and no new action types appeared
    PlateauDetected,
    /// Node or time ceiling hit
    BudgetExhausted,
    /// Caller cancelled the search
    Cancelled,
    /// The best node sits at the depth limit
    MaxDepthReached,
    /// Frontier emptied after at least one valid expansion
    FrontierExhausted,
    /// Frontier emptied without a single valid expansion
    NoPlanFound,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoalReached => "GOAL_REACHED",
            Self::PlateauDetected => "PLATEAU_DETECTED",
            Self::BudgetExhausted => "BUDGET_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
            Self::MaxDepthReached => "MAX_DEPTH_REACHED",
            Self::FrontierExhausted => "FRONTIER_EXHAUSTED",
            Self::NoPlanFound => "NO_PLAN_FOUND",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::GoalReached)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorPhase {
    Running,
    Halted(TerminationReason),
    Terminated(TerminationReason),
}

/// What the planner reports after each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationMetrics {
    /// Best f in the frontier, `Unknown` when empty or unscored
    pub best_f: Estimate,
    /// Distinct action types generated so far
    pub diversity: usize,
    pub elapsed: Duration,
    pub nodes_expanded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorSignal {
    Continue,
    Halt(TerminationReason),
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    best_f: u64,
    diversity: usize,
}

pub struct ProgressGovernor {
    window: VecDeque<Sample>,
    window_size: usize,
    threshold: f64,
    max_nodes: u64,
    max_time: Duration,
    phase: GovernorPhase,
}

impl ProgressGovernor {
    pub fn new(config: &GovernorConfig, budget: &Budget) -> Self {
        debug!(?config, ?budget, "ProgressGovernor::new: called");
        let window_size = config.plateau_window.max(2);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            threshold: config.plateau_threshold,
            max_nodes: budget.max_nodes,
            max_time: budget.max_time,
            phase: GovernorPhase::Running,
        }
    }

    pub fn phase(&self) -> GovernorPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == GovernorPhase::Running
    }

    /// Feed one iteration's metrics
    pub fn observe(&mut self, metrics: IterationMetrics) -> GovernorSignal {
        debug!(?metrics, "ProgressGovernor::observe: called");
        if let Some(reason) = self.reason() {
            return GovernorSignal::Halt(reason);
        }

        if metrics.nodes_expanded >= self.max_nodes || metrics.elapsed >= self.max_time {
            info!(
                nodes_expanded = metrics.nodes_expanded,
                elapsed_ms = metrics.elapsed.as_millis() as u64,
                "ProgressGovernor::observe: budget exhausted"
            );
            return self.halt(TerminationReason::BudgetExhausted);
        }

        if let Estimate::Finite(best_f) = metrics.best_f {
            if self.window.len() == self.window_size {
                self.window.pop_front();
            }
            self.window.push_back(Sample {
                best_f,
                diversity: metrics.diversity,
            });
        }

        if self.plateaued() {
            info!(window = self.window_size, "ProgressGovernor::observe: plateau detected");
            return self.halt(TerminationReason::PlateauDetected);
        }
        GovernorSignal::Continue
    }

    /// Force a transition out of `Running`; the first reason sticks
    pub fn halt(&mut self, reason: TerminationReason) -> GovernorSignal {
        match self.phase {
            GovernorPhase::Running => {
                debug!(%reason, "ProgressGovernor::halt: halting");
                self.phase = GovernorPhase::Halted(reason);
                GovernorSignal::Halt(reason)
            }
            GovernorPhase::Halted(existing) | GovernorPhase::Terminated(existing) => GovernorSignal::Halt(existing),
        }
    }

    pub fn goal_reached(&mut self) -> GovernorSignal {
        self.halt(TerminationReason::GoalReached)
    }

    pub fn cancelled(&mut self) -> GovernorSignal {
        self.halt(TerminationReason::Cancelled)
    }

    /// Move to `Terminated`; `None` while still running
    pub fn finish(&mut self) -> Option<TerminationReason> {
        let reason = self.reason()?;
        self.phase = GovernorPhase::Terminated(reason);
        Some(reason)
    }

    fn reason(&self) -> Option<TerminationReason> {
        match self.phase {
            GovernorPhase::Running => None,
            GovernorPhase::Halted(r) | GovernorPhase::Terminated(r) => Some(r),
        }
    }

    fn plateaued(&self) -> bool {
        if self.window.len() < self.window_size {
            return false;
        }
        let (Some(oldest), Some(newest)) = (self.window.front(), self.window.back()) else {
            return false;
        };
        let improvement = (oldest.best_f as f64 - newest.best_f as f64) / (oldest.best_f.max(1) as f64);
        improvement < self.threshold && newest.diversity <= oldest.diversity
    }
}
