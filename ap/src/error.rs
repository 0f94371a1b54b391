//! Errors rejected at planner entry

use thiserror::Error;

/// The only failures `find_optimal_plan` reports as `Err`
///
/// Everything that happens once the search loop has started ends in a
/// `PlanResult` with an explicit termination reason instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    #[error("Invalid planning request: {0}")]
    InvalidRequest(String),

    #[error("Invalid planner configuration: {0}")]
    InvalidConfig(String),
}
