//! PlanningSession - plan, validate, and re-plan at most once
//!
//! The outcome handed to the execution engine always carries both the plan
//! and the validation report, approved or not.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::AStarPlanner;
use super::result::{Budget, PlanResult};
use crate::error::PlanError;
use crate::governor::TerminationReason;
use crate::tools::ToolSpec;
use crate::validation::{PlanValidator, Severity, ValidationReport};

/// Hard maximum of re-plans after a rejection
pub const MAX_REPLANS: u32 = 1;

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub task_description: String,
    pub tools: Vec<ToolSpec>,
    pub budget: Budget,
}

impl PlanRequest {
    pub fn new(task_description: impl Into<String>, tools: Vec<ToolSpec>, budget: Budget) -> Self {
        Self {
            task_description: task_description.into(),
            tools,
            budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Verdict {
    Approved,
    ValidationRejected { reason: String },
    NoPlanFound { reason: String },
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// What the execution engine receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningOutcome {
    pub result: PlanResult,
    pub report: ValidationReport,
    pub verdict: Verdict,
    /// Risk categories excluded during the re-plan, empty when none ran
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vetoed: Vec<String>,
}

pub struct PlanningSession {
    planner: AStarPlanner,
    validator: PlanValidator,
    max_replans: u32,
}

impl PlanningSession {
    pub fn new(planner: AStarPlanner, validator: PlanValidator) -> Self {
        debug!("PlanningSession::new: called");
        Self {
            planner,
            validator,
            max_replans: MAX_REPLANS,
        }
    }

    /// Allow 0 or 1 re-plans; larger values are capped
    pub fn with_max_replans(mut self, max_replans: u32) -> Self {
        self.max_replans = max_replans.min(MAX_REPLANS);
        self
    }

    pub fn planner(&self) -> &AStarPlanner {
        &self.planner
    }

    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    pub async fn run(&self, request: &PlanRequest) -> Result<PlanningOutcome, PlanError> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        request: &PlanRequest,
        cancel: CancellationToken,
    ) -> Result<PlanningOutcome, PlanError> {
        debug!(task = %request.task_description, "PlanningSession::run_with_cancel: called");
        let result = self
            .planner
            .search_plan(&request.task_description, &request.tools, request.budget, &[], &cancel)
            .await?;

        if result.actions.is_empty() {
            let report = self.validator.validate(&[], &request.tools);
            let verdict = Verdict::NoPlanFound {
                reason: no_plan_reason(result.termination_reason),
            };
            return Ok(PlanningOutcome {
                result,
                report,
                verdict,
                vetoed: Vec::new(),
            });
        }

        let report = self.validator.validate(&result.actions, &request.tools);
        if report.approved {
            info!(actions = result.actions.len(), "Plan approved");
            return Ok(PlanningOutcome {
                result,
                report,
                verdict: Verdict::Approved,
                vetoed: Vec::new(),
            });
        }

        let vetoed = self.validator.offending_categories(&report);
        let rejection = Verdict::ValidationRejected {
            reason: rejection_reason(&report, self.validator.reject_threshold()),
        };
        if self.max_replans == 0 || vetoed.is_empty() || cancel.is_cancelled() {
            debug!(?vetoed, "PlanningSession::run_with_cancel: rejected without re-plan");
            return Ok(PlanningOutcome {
                result,
                report,
                verdict: rejection,
                vetoed: Vec::new(),
            });
        }

        info!(?vetoed, "Plan rejected, re-planning without offending categories");
        let mut replanned = self
            .planner
            .search_plan(&request.task_description, &request.tools, request.budget, &vetoed, &cancel)
            .await?;
        replanned.stats.replan_attempts = 1;

        if replanned.actions.is_empty() {
            warn!(reason = %replanned.termination_reason, "Re-plan found no plan, keeping the rejected one");
            let mut original = result;
            original.stats.replan_attempts = 1;
            return Ok(PlanningOutcome {
                result: original,
                report,
                verdict: rejection,
                vetoed,
            });
        }

        let report = self.validator.validate(&replanned.actions, &request.tools);
        let verdict = if report.approved {
            info!(actions = replanned.actions.len(), "Re-plan approved");
            Verdict::Approved
        } else {
            Verdict::ValidationRejected {
                reason: rejection_reason(&report, self.validator.reject_threshold()),
            }
        };
        Ok(PlanningOutcome {
            result: replanned,
            report,
            verdict,
            vetoed,
        })
    }
}

fn no_plan_reason(reason: TerminationReason) -> String {
    match reason {
        TerminationReason::NoPlanFound => "the frontier emptied without a single valid expansion".to_string(),
        TerminationReason::Cancelled => "cancelled before any action was generated".to_string(),
        other => format!("search stopped ({}) before any action was generated", other),
    }
}

fn rejection_reason(report: &ValidationReport, threshold: Severity) -> String {
    let blocking: Vec<&str> = report
        .issues
        .iter()
        .filter(|i| i.severity >= threshold || i.severity == Severity::Critical)
        .map(|i| i.description.as_str())
        .collect();
    format!(
        "{} issue(s) at or above {}: {}",
        blocking.len(),
        threshold,
        blocking.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GovernorConfig, SearchConfig};
    use crate::oracle::{ActionCandidate, ActionOracle, HeuristicOracle, ProposalRequest};
    use crate::search::{Estimate, PlanningState};
    use crate::validation::{RiskCatalog, RiskRule};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Root proposes `first`; every other state proposes DONE
    struct TwoStep {
        first: Vec<ActionCandidate>,
    }

    #[async_trait]
    impl ActionOracle for TwoStep {
        async fn propose_actions(&self, request: ProposalRequest<'_>) -> Vec<ActionCandidate> {
            if request.state.is_root() {
                self.first.clone()
            } else {
                vec![ActionCandidate::new("DONE", "").completing()]
            }
        }
    }

    /// h = 0 for completing states, otherwise the position of the tool in `order`
    struct Ranked {
        order: Vec<&'static str>,
    }

    #[async_trait]
    impl HeuristicOracle for Ranked {
        async fn estimate(&self, state: &PlanningState) -> Estimate {
            if state.plan_complete {
                return Estimate::Finite(0);
            }
            let tool = state.last_action().map(|a| a.tool.as_str()).unwrap_or("");
            let rank = self.order.iter().position(|t| *t == tool).unwrap_or(self.order.len());
            Estimate::Finite(rank as u64 + 1)
        }
    }

    fn session(first: &[&'static str]) -> PlanningSession {
        let catalog = RiskCatalog::new(&RiskRule::defaults()).unwrap();
        let planner = AStarPlanner::new(
            Arc::new(TwoStep {
                first: first.iter().map(|t| ActionCandidate::new(*t, "")).collect(),
            }),
            Arc::new(Ranked { order: first.to_vec() }),
            SearchConfig::default(),
            GovernorConfig::default(),
        )
        .with_risk_catalog(catalog.clone());
        PlanningSession::new(planner, PlanValidator::new(catalog, Severity::High))
    }

    fn request() -> PlanRequest {
        PlanRequest::new("close my old account", vec![], Budget::new(50, Duration::from_secs(10), 5))
    }

    #[tokio::test]
    async fn test_approved_plan() {
        let outcome = session(&["archive_account"]).run(&request()).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Approved);
        assert_eq!(outcome.result.actions.len(), 2);
        assert_eq!(outcome.result.stats.replan_attempts, 0);
        assert!(outcome.vetoed.is_empty());
    }

    #[tokio::test]
    async fn test_replan_replaces_rejected_plan() {
        let outcome = session(&["delete_account", "archive_account"])
            .run(&request())
            .await
            .unwrap();
        assert!(outcome.verdict.is_approved());
        assert_eq!(outcome.result.actions[0].tool, "archive_account");
        assert_eq!(outcome.result.stats.replan_attempts, 1);
        assert_eq!(outcome.result.stats.candidates_filtered, 1);
        assert_eq!(outcome.vetoed, vec!["irreversible".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_replan_keeps_rejection() {
        let outcome = session(&["delete_account"]).run(&request()).await.unwrap();
        assert!(matches!(outcome.verdict, Verdict::ValidationRejected { .. }));
        assert!(!outcome.report.approved);
        assert_eq!(outcome.result.actions[0].tool, "delete_account");
        assert_eq!(outcome.result.stats.replan_attempts, 1);
    }

    #[tokio::test]
    async fn test_no_replan_when_disabled() {
        let outcome = session(&["delete_account"])
            .with_max_replans(0)
            .run(&request())
            .await
            .unwrap();
        assert!(matches!(outcome.verdict, Verdict::ValidationRejected { .. }));
        assert_eq!(outcome.result.stats.replan_attempts, 0);
    }

    #[tokio::test]
    async fn test_no_plan_verdict() {
        let outcome = session(&[]).run(&request()).await.unwrap();
        assert!(matches!(outcome.verdict, Verdict::NoPlanFound { .. }));
        assert!(outcome.report.approved);
    }

    #[test]
    fn test_verdict_json() {
        let verdict = Verdict::ValidationRejected {
            reason: "x".to_string(),
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "validation-rejected");
        assert_eq!(json["reason"], "x");
    }
}
