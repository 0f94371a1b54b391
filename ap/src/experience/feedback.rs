//! Execution feedback reported after a plan has run

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::search::Action;

/// Words skipped when deriving a task type from a goal
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "to", "for", "of", "in", "on", "at", "with", "by", "from", "into", "my", "me", "i",
    "we", "our", "please", "some", "then", "it", "this", "that", "is", "are", "be",
];

/// Leading content words kept in a task type
const TASK_TYPE_WORDS: usize = 3;

/// Actual outcome of one executed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    #[serde(rename = "action")]
    pub action_descriptor: String,
    #[serde(rename = "predicted")]
    pub predicted_cost: u64,
    #[serde(rename = "observed")]
    pub observed_cost: u64,
}

/// Outcomes reported by the execution engine for one plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFeedback {
    #[serde(rename = "task-type")]
    pub task_type: String,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionFeedback {
    /// Pair planned actions with observed costs, in order
    ///
    /// Extra actions or extra costs on either side are ignored.
    pub fn from_plan(task_type: impl Into<String>, actions: &[Action], observed: &[u64]) -> Self {
        let outcomes = actions
            .iter()
            .zip(observed)
            .map(|(action, observed)| ActionOutcome {
                action_descriptor: action.descriptor(),
                predicted_cost: action.cost,
                observed_cost: *observed,
            })
            .collect();
        Self {
            task_type: task_type.into(),
            outcomes,
        }
    }

    /// Load from a YAML or JSON file
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "ExecutionFeedback::load: called");
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read feedback from {}", path.display()))?;
        serde_yaml::from_str(&content).context(format!("Failed to parse feedback from {}", path.display()))
    }
}

/// Derive a stable task type from a goal, e.g. "book a flight and hotel" -> `book-flight-hotel`
pub fn task_type_of(goal: &str) -> String {
    let words: Vec<String> = goal
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .take(TASK_TYPE_WORDS)
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        "general".to_string()
    } else {
        words.join("-")
    }
}
