//! AStarPlanner - cognitive A* planning over tool invocations
//!
//! Turns a free-text goal into an ordered sequence of tool calls by running
//! best-first search over hypothetical task states. A text-generation
//! service acts as both the successor function (it proposes next actions)
//! and the heuristic (it estimates the remaining cost).
//!
//! # Modules
//!
//! - [`search`] - states, arena, frontier, visited set
//! - [`oracle`] - action proposals and cost estimates from the generation service
//! - [`experience`] - heuristic correction from recorded execution outcomes
//! - [`governor`] - plateau detection and hard ceilings
//! - [`planner`] - the A* loop and the validate/re-plan session
//! - [`validation`] - risk and ordering review of finished plans
//! - [`llm`] - generation service clients
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//!
//! # Determinism
//!
//! With deterministic oracles (scripted test doubles) identical inputs give
//! identical `PlanResult`s. Against a live generation service results vary
//! from run to run.

pub mod cli;
pub mod config;
pub mod error;
pub mod experience;
pub mod governor;
pub mod llm;
pub mod oracle;
pub mod planner;
pub mod search;
pub mod tools;
pub mod validation;

pub use config::{Config, LlmConfig};
pub use error::PlanError;
pub use experience::{EpisodicHeuristicAdjuster, ExecutionFeedback};
pub use governor::{GovernorSignal, IterationMetrics, ProgressGovernor, TerminationReason};
pub use llm::{LlmClient, LlmError, create_client};
pub use oracle::{ActionCandidate, ActionOracle, HeuristicOracle, LlmActionOracle, LlmHeuristicOracle, ProposalRequest};
pub use planner::{AStarPlanner, Budget, PlanRequest, PlanResult, PlanningOutcome, PlanningSession, SearchStats, Verdict};
pub use search::{Action, Estimate, PlanningState};
pub use tools::{OrderingConstraint, ToolSpec};
pub use validation::{PlanValidator, RiskCatalog, Severity, ValidationReport};
