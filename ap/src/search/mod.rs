//! Core search data structures

mod frontier;
mod node;
mod state;
mod visited;

pub use frontier::Frontier;
pub use node::{Estimate, SearchNode};
pub use state::{Action, DEFAULT_ACTION_COST, MAX_COST_HINT, PlanningState, StateArena, StateId};
pub use visited::{VisitedSet, state_signature};
