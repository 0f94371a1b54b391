//! Planner: the A* loop and the validate/re-plan session around it

mod engine;
mod result;
mod session;

pub use engine::AStarPlanner;
pub use result::{Budget, PlanResult, SearchStats, StateSnapshot};
pub use session::{MAX_REPLANS, PlanRequest, PlanningOutcome, PlanningSession, Verdict};
