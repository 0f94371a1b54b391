//! Oracles: the generation service as proposal function and heuristic

mod action;
mod heuristic;
pub mod parse;
pub mod prompts;

pub use action::{ActionCandidate, ActionOracle, LlmActionOracle, ProposalRequest};
pub use heuristic::{HeuristicOracle, LlmHeuristicOracle};
pub use parse::{ProposalParse, parse_estimate, parse_proposals};
