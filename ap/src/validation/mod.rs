//! Plan validation
//!
//! Two passes over a finished plan:
//! - risk assessment: every action descriptor is matched against the
//!   configurable `RiskCatalog`
//! - strategic analysis: tool ordering constraints are checked against the
//!   action sequence
//!
//! Critical findings are never approved, whatever the threshold.

mod risk;
mod validator;

pub use risk::{RiskCatalog, RiskCatalogError, RiskMatch, RiskRule, Severity};
pub use validator::{ORDERING_CATEGORY, PlanValidator, UNKNOWN_TOOL_CATEGORY, ValidationIssue, ValidationReport};
