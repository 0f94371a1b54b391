//! ap - plan, validate and learn from tool-invocation plans

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use astarplanner::cli::{Cli, Command, get_log_path, load_plan};
use astarplanner::config::Config;
use astarplanner::experience::{EpisodicHeuristicAdjuster, ExecutionFeedback, task_type_of};
use astarplanner::llm::create_client;
use astarplanner::oracle::{LlmActionOracle, LlmHeuristicOracle};
use astarplanner::planner::{AStarPlanner, PlanRequest, PlanningOutcome, PlanningSession, Verdict};
use astarplanner::tools::{ToolSpec, load_tools};
use astarplanner::validation::{PlanValidator, RiskCatalog, Severity, ValidationReport};
use experiencestore::JsonlExperienceStore;

/// Exit status when no approved plan came out
const EXIT_NOT_APPROVED: i32 = 2;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan {
            task,
            tools,
            max_nodes,
            max_time_ms,
            max_depth,
            task_type,
            no_experience,
            json,
        } => {
            let mut config = config;
            if let Some(n) = max_nodes {
                config.search.max_nodes = n;
            }
            if let Some(ms) = max_time_ms {
                config.search.max_time_ms = ms;
            }
            if let Some(d) = max_depth {
                config.search.max_depth = d;
            }
            if no_experience {
                config.experience.enabled = false;
            }
            cmd_plan(&config, task, tools.as_deref(), task_type, json).await
        }
        Command::Validate { plan, tools, json } => cmd_validate(&config, &plan, tools.as_deref(), json),
        Command::Feedback {
            file,
            plan,
            observed,
            task_type,
        } => cmd_feedback(&config, file, plan, &observed, task_type),
        Command::Config => cmd_config(&config),
    }
}

fn read_tools(path: Option<&Path>) -> Result<Vec<ToolSpec>> {
    match path {
        Some(p) => load_tools(p),
        None => Ok(Vec::new()),
    }
}

fn build_validator(config: &Config) -> Result<PlanValidator> {
    let catalog = RiskCatalog::new(&config.validation.risk_categories).context("Invalid risk categories")?;
    Ok(PlanValidator::new(catalog, config.validation.reject_threshold))
}

fn open_store(config: &Config) -> Result<Arc<JsonlExperienceStore>> {
    let path = config.experience.store_path();
    let store = JsonlExperienceStore::open(&path, config.experience.store_options())
        .context(format!("Failed to open experience store at {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn cmd_plan(
    config: &Config,
    task: String,
    tools_path: Option<&Path>,
    task_type: Option<String>,
    json: bool,
) -> Result<()> {
    debug!(%task, ?tools_path, ?task_type, json, "cmd_plan: called");
    let tools = read_tools(tools_path)?;
    let budget = config.search.budget();

    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let action_oracle = Arc::new(LlmActionOracle::new(client.clone(), config.oracle.clone()));
    let heuristic_oracle = Arc::new(LlmHeuristicOracle::new(client, config.oracle.clone()));

    let validator = build_validator(config)?;
    let mut planner = AStarPlanner::new(
        action_oracle,
        heuristic_oracle,
        config.search.clone(),
        config.governor.clone(),
    )
    .with_risk_catalog(validator.catalog().clone());

    if config.experience.enabled {
        let task_type = task_type.unwrap_or_else(|| task_type_of(&task));
        info!(%task_type, "Experience correction enabled");
        let adjuster = EpisodicHeuristicAdjuster::new(open_store(config)?, task_type, &config.experience);
        planner = planner.with_adjuster(Arc::new(adjuster));
    }

    let session = PlanningSession::new(planner, validator).with_max_replans(config.validation.max_replans);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling search");
                cancel.cancel();
            }
        })
    };

    let request = PlanRequest::new(task, tools, budget);
    let outcome = session.run_with_cancel(&request, cancel).await;
    ctrl_c.abort();
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if !outcome.verdict.is_approved() {
        std::process::exit(EXIT_NOT_APPROVED);
    }
    Ok(())
}

fn cmd_validate(config: &Config, plan_path: &Path, tools_path: Option<&Path>, json: bool) -> Result<()> {
    debug!(plan = %plan_path.display(), ?tools_path, json, "cmd_validate: called");
    let plan = load_plan(plan_path)?;
    let tools = read_tools(tools_path)?;
    let report = build_validator(config)?.validate(&plan.actions, &tools);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.approved {
        std::process::exit(EXIT_NOT_APPROVED);
    }
    Ok(())
}

fn cmd_feedback(
    config: &Config,
    file: Option<PathBuf>,
    plan: Option<PathBuf>,
    observed: &[u64],
    task_type: Option<String>,
) -> Result<()> {
    debug!(?file, ?plan, ?observed, ?task_type, "cmd_feedback: called");
    let mut feedback = match (file, plan) {
        (Some(file), _) => ExecutionFeedback::load(&file)?,
        (None, Some(plan_path)) => {
            let plan = load_plan(&plan_path)?;
            if plan.actions.len() != observed.len() {
                warn!(
                    actions = plan.actions.len(),
                    observed = observed.len(),
                    "cmd_feedback: action and cost counts differ, extra entries ignored"
                );
            }
            let task_type = match (&task_type, &plan.task_description) {
                (Some(t), _) => t.clone(),
                (None, Some(goal)) => task_type_of(goal),
                (None, None) => bail!("--task-type is required when the plan file has no task description"),
            };
            ExecutionFeedback::from_plan(task_type, &plan.actions, observed)
        }
        (None, None) => bail!("Provide a feedback file or --plan with --observed"),
    };
    if let Some(t) = task_type {
        feedback.task_type = t;
    }
    if feedback.task_type.is_empty() {
        bail!("Feedback has no task type; pass --task-type");
    }

    let adjuster = EpisodicHeuristicAdjuster::new(open_store(config)?, feedback.task_type.clone(), &config.experience);
    let count = adjuster.record_feedback(&feedback)?;
    println!(
        "{} Recorded {} outcome(s) for {}",
        "✓".green(),
        count,
        feedback.task_type.cyan()
    );
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Low => severity.as_str().normal(),
        Severity::Medium => severity.as_str().yellow(),
        Severity::High => severity.as_str().red(),
        Severity::Critical => severity.as_str().red().bold(),
    }
}

fn print_report(report: &ValidationReport) {
    let status = if report.approved {
        "approved".green().bold()
    } else {
        "rejected".red().bold()
    };
    println!("Validation: {} (risk: {})", status, report.risk_label());
    for issue in &report.issues {
        println!(
            "  [{}] {}: {}",
            severity_label(issue.severity),
            issue.category.cyan(),
            issue.description
        );
        if let Some(alternative) = &issue.suggested_alternative {
            println!("      {} {}", "→".dimmed(), alternative.dimmed());
        }
    }
}

fn print_outcome(outcome: &PlanningOutcome) {
    let result = &outcome.result;
    let reason = if result.reached_goal() {
        result.termination_reason.to_string().green()
    } else {
        result.termination_reason.to_string().yellow()
    };
    println!("{} {}", "Goal:".bold(), result.task_description);
    println!("{} {}", "Termination:".bold(), reason);
    println!("{} {}", "Total cost:".bold(), result.total_cost());

    if result.actions.is_empty() {
        println!("  (no actions)");
    }
    for (i, action) in result.actions.iter().enumerate() {
        let marker = if action.plan_complete { " ✓".green() } else { "".normal() };
        println!("  {:>2}. {} (cost {}){}", i + 1, action.descriptor().yellow(), action.cost, marker);
    }

    let s = &result.stats;
    println!(
        "{}",
        format!(
            "Expanded {} / generated {} nodes, {} duplicates, {} filtered, {} re-plan(s)",
            s.nodes_expanded, s.nodes_generated, s.duplicates_skipped, s.candidates_filtered, s.replan_attempts
        )
        .dimmed()
    );
    if !outcome.vetoed.is_empty() {
        println!("Re-planned without: {}", outcome.vetoed.join(", ").cyan());
    }

    print_report(&outcome.report);
    match &outcome.verdict {
        Verdict::Approved => println!("{} Plan approved", "✓".green()),
        Verdict::ValidationRejected { reason } => println!("{} Plan rejected: {}", "✗".red(), reason),
        Verdict::NoPlanFound { reason } => println!("{} No plan found: {}", "✗".red(), reason),
    }
}
