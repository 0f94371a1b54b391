//! CLI command definitions and plan file loading

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::planner::{PlanResult, PlanningOutcome};
use crate::search::Action;

/// AStarPlanner - LLM-guided A* planning over tool invocations
#[derive(Parser)]
#[command(name = "ap", version, about = "Turn a goal into a validated sequence of tool invocations")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search for a plan, validate it, re-plan once if rejected
    ///
    /// Exits with status 2 when no approved plan comes out.
    Plan {
        /// Goal in free text
        task: String,

        /// Tool catalogue (YAML or JSON list of tools)
        #[arg(short, long)]
        tools: Option<PathBuf>,

        #[arg(long)]
        max_nodes: Option<u64>,

        #[arg(long)]
        max_time_ms: Option<u64>,

        #[arg(long)]
        max_depth: Option<u32>,

        /// Task type used for experience lookups (derived from the goal if omitted)
        #[arg(long)]
        task_type: Option<String>,

        /// Skip experience-based heuristic correction
        #[arg(long)]
        no_experience: bool,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate an existing plan against the risk catalogue and tool constraints
    Validate {
        /// Plan file: a saved outcome, a plan result, or a list of actions
        plan: PathBuf,

        #[arg(short, long)]
        tools: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Record execution outcomes in the experience store
    Feedback {
        /// Feedback file (`task-type` plus `outcomes`)
        #[arg(conflicts_with = "plan", required_unless_present = "plan")]
        file: Option<PathBuf>,

        /// Executed plan file, paired with --observed
        #[arg(long, requires = "observed")]
        plan: Option<PathBuf>,

        /// Observed costs, one per action in order
        #[arg(long, value_delimiter = ',')]
        observed: Vec<u64>,

        /// Task type (derived from the plan's goal if omitted)
        #[arg(long)]
        task_type: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

/// A plan read back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlan {
    pub task_description: Option<String>,
    pub actions: Vec<Action>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Outcome(Box<PlanningOutcome>),
    Result(Box<PlanResult>),
    Actions(Vec<Action>),
}

/// Load `ap plan --json` output, a bare `PlanResult`, or a list of actions
pub fn load_plan(path: &Path) -> Result<LoadedPlan> {
    debug!(path = %path.display(), "load_plan: called");
    let content = std::fs::read_to_string(path).context(format!("Failed to read plan from {}", path.display()))?;
    let file: PlanFile = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&content).context(format!("Failed to parse plan from {}", path.display()))?
    } else {
        serde_yaml::from_str(&content).context(format!("Failed to parse plan from {}", path.display()))?
    };
    Ok(match file {
        PlanFile::Outcome(outcome) => LoadedPlan {
            task_description: Some(outcome.result.task_description),
            actions: outcome.result.actions,
        },
        PlanFile::Result(result) => LoadedPlan {
            task_description: Some(result.task_description),
            actions: result.actions,
        },
        PlanFile::Actions(actions) => LoadedPlan {
            task_description: None,
            actions,
        },
    })
}

/// Location of the `ap` log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("astarplanner")
        .join("logs")
        .join("ap.log")
}
