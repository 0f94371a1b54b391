//! Learning from executed plans

mod adjuster;
mod feedback;

pub use adjuster::{EpisodicHeuristicAdjuster, MAX_FACTOR, MIN_FACTOR, factor_from_matches};
pub use feedback::{ActionOutcome, ExecutionFeedback, task_type_of};
