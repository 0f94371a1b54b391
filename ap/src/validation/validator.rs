//! PlanValidator - post-hoc safety and strategy review of a finished plan

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::risk::{RiskCatalog, Severity};
use crate::search::Action;
use crate::tools::{OrderingConstraint, ToolSpec, find_tool};

/// Category used for ordering constraint violations
pub const ORDERING_CATEGORY: &str = "ordering";

/// Category used for actions naming tools outside the catalogue
pub const UNKNOWN_TOOL_CATEGORY: &str = "unknown-tool";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: String,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
    /// Zero-based index of the offending action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub approved: bool,
    /// Highest severity among the issues, `None` for a clean plan
    pub risk_level: Option<Severity>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn risk_label(&self) -> &'static str {
        self.risk_level.map_or("none", |s| s.as_str())
    }
}

pub struct PlanValidator {
    catalog: RiskCatalog,
    reject_threshold: Severity,
}

impl PlanValidator {
    pub fn new(catalog: RiskCatalog, reject_threshold: Severity) -> Self {
        debug!(%reject_threshold, "PlanValidator::new: called");
        Self {
            catalog,
            reject_threshold,
        }
    }

    pub fn catalog(&self) -> &RiskCatalog {
        &self.catalog
    }

    pub fn reject_threshold(&self) -> Severity {
        self.reject_threshold
    }

    /// Review a plan against the risk catalogue and the tools' ordering constraints
    pub fn validate(&self, actions: &[Action], tools: &[ToolSpec]) -> ValidationReport {
        debug!(actions = actions.len(), tools = tools.len(), "PlanValidator::validate: called");
        let mut issues = self.assess_risk(actions);
        issues.extend(analyze_ordering(actions, tools));
        issues.extend(unknown_tools(actions, tools));

        let risk_level = issues.iter().map(|i| i.severity).max();
        let approved = !issues
            .iter()
            .any(|i| i.severity >= self.reject_threshold || i.severity == Severity::Critical);

        info!(approved, risk = ?risk_level, issues = issues.len(), "PlanValidator::validate: done");
        ValidationReport {
            approved,
            risk_level,
            issues,
        }
    }

    /// Risk categories that caused a rejection, excludable on a re-plan
    ///
    /// Only catalogue categories are returned; ordering and unknown-tool
    /// issues cannot be filtered out of proposals.
    pub fn offending_categories(&self, report: &ValidationReport) -> Vec<String> {
        let categories: BTreeSet<&str> = report
            .issues
            .iter()
            .filter(|i| i.severity >= self.reject_threshold || i.severity == Severity::Critical)
            .map(|i| i.category.as_str())
            .filter(|c| self.catalog.contains_category(c))
            .collect();
        categories.into_iter().map(str::to_string).collect()
    }

    fn assess_risk(&self, actions: &[Action]) -> Vec<ValidationIssue> {
        actions
            .iter()
            .enumerate()
            .flat_map(|(index, action)| {
                self.catalog
                    .classify(action)
                    .into_iter()
                    .map(move |m| ValidationIssue {
                        category: m.category.to_string(),
                        severity: m.severity,
                        description: format!("step {} `{}` is {} risk ({})", index + 1, action, m.severity, m.category),
                        suggested_alternative: m.suggested_alternative.map(str::to_string),
                        action_index: Some(index),
                    })
            })
            .collect()
    }
}

fn ordering_issue(index: usize, description: String) -> ValidationIssue {
    ValidationIssue {
        category: ORDERING_CATEGORY.to_string(),
        severity: Severity::Medium,
        description,
        suggested_alternative: None,
        action_index: Some(index),
    }
}

/// Check each tool's declared ordering constraints against the plan
fn analyze_ordering(actions: &[Action], tools: &[ToolSpec]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for tool in tools.iter().filter(|t| !t.ordering_constraints.is_empty()) {
        let positions: Vec<usize> = actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.tool == tool.name)
            .map(|(i, _)| i)
            .collect();

        for constraint in &tool.ordering_constraints {
            match constraint {
                OrderingConstraint::After { tool: prerequisite } => {
                    for &i in &positions {
                        if !actions[..i].iter().any(|a| &a.tool == prerequisite) {
                            issues.push(ordering_issue(
                                i,
                                format!("step {} `{}` must come after `{}`", i + 1, tool.name, prerequisite),
                            ));
                        }
                    }
                }
                OrderingConstraint::Before { tool: later } => {
                    for &i in &positions {
                        if actions[..i].iter().any(|a| &a.tool == later) {
                            issues.push(ordering_issue(
                                i,
                                format!("step {} `{}` must come before `{}`", i + 1, tool.name, later),
                            ));
                        }
                    }
                }
                OrderingConstraint::Once => {
                    for &i in positions.iter().skip(1) {
                        issues.push(ordering_issue(
                            i,
                            format!("step {} repeats `{}`, which may run at most once", i + 1, tool.name),
                        ));
                    }
                }
            }
        }
    }
    issues.sort_by_key(|i| i.action_index);
    issues
}

fn unknown_tools(actions: &[Action], tools: &[ToolSpec]) -> Vec<ValidationIssue> {
    if tools.is_empty() {
        return Vec::new();
    }
    actions
        .iter()
        .enumerate()
        .filter(|(_, a)| !a.plan_complete && find_tool(tools, &a.tool).is_none())
        .map(|(i, a)| ValidationIssue {
            category: UNKNOWN_TOOL_CATEGORY.to_string(),
            severity: Severity::Low,
            description: format!("step {} uses `{}`, which is not in the tool catalogue", i + 1, a.tool),
            suggested_alternative: None,
            action_index: Some(i),
        })
        .collect()
}
