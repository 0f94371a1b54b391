//! Tool catalogue supplied with each planning request

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One tool the plan may invoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,

    /// Call signature shown to the oracle, e.g. `book_flight(flight_id)`
    #[serde(default)]
    pub signature: String,

    #[serde(default, rename = "ordering-constraints", skip_serializing_if = "Vec::is_empty")]
    pub ordering_constraints: Vec<OrderingConstraint>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signature: signature.into(),
            ordering_constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: OrderingConstraint) -> Self {
        self.ordering_constraints.push(constraint);
        self
    }
}

/// Ordering rule for a tool relative to the rest of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OrderingConstraint {
    /// Only valid once `tool` has already run
    After { tool: String },
    /// Must run before any use of `tool`
    Before { tool: String },
    /// At most one invocation per plan
    Once,
}

impl std::fmt::Display for OrderingConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderingConstraint::After { tool } => write!(f, "after {}", tool),
            OrderingConstraint::Before { tool } => write!(f, "before {}", tool),
            OrderingConstraint::Once => write!(f, "at most once"),
        }
    }
}

/// Look up a tool by name
pub fn find_tool<'a>(tools: &'a [ToolSpec], name: &str) -> Option<&'a ToolSpec> {
    tools.iter().find(|t| t.name == name)
}

/// Load a tool catalogue from a YAML (or JSON) file
pub fn load_tools(path: &Path) -> Result<Vec<ToolSpec>> {
    debug!(path = %path.display(), "load_tools: called");
    let content = std::fs::read_to_string(path).context(format!("Failed to read tools from {}", path.display()))?;
    let tools: Vec<ToolSpec> =
        serde_yaml::from_str(&content).context(format!("Failed to parse tools from {}", path.display()))?;
    Ok(tools)
}
