use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use experiencestore::cli::{Cli, Command};
use experiencestore::config::Config;
use experiencestore::{ExperienceRecord, ExperienceStore, JsonlExperienceStore};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    info!("experiencestore starting");

    let store = JsonlExperienceStore::open(&config.store_path, config.store_options())
        .context(format!("Failed to open store at {}", config.store_path.display()))?;

    match cli.command {
        Command::Append {
            task_type,
            action,
            predicted,
            observed,
        } => {
            let record = ExperienceRecord::new(task_type, action, predicted, observed);
            let id = record.id.clone();
            store.append(record)?;
            println!("{} Recorded: {}", "✓".green(), id.cyan());
        }
        Command::Query {
            task_type,
            action,
            limit,
            min_similarity,
        } => {
            let matches = store.query(&task_type, &action, min_similarity, limit)?;
            if matches.is_empty() {
                println!("No matching records");
            }
            for m in matches {
                println!(
                    "{} {:.2} {} predicted={} observed={}",
                    format_ts(m.record.timestamp).dimmed(),
                    m.similarity,
                    m.record.action_descriptor.yellow(),
                    m.record.predicted_cost,
                    m.record.observed_cost
                );
            }
        }
        Command::List { tail } => {
            let records = store.records()?;
            let skip = tail.map(|n| records.len().saturating_sub(n)).unwrap_or(0);
            for r in records.iter().skip(skip) {
                println!(
                    "{} {} {} predicted={} observed={}",
                    format_ts(r.timestamp).dimmed(),
                    r.task_type.cyan(),
                    r.action_descriptor.yellow(),
                    r.predicted_cost,
                    r.observed_cost
                );
            }
        }
        Command::Stats => {
            let stats = store.stats()?;
            println!("Store: {}", config.store_path.display().to_string().cyan());
            println!("  Records: {}", stats.record_count);
            println!("  Task types: {}", stats.task_type_count);
            if let (Some(oldest), Some(newest)) = (stats.oldest_timestamp, stats.newest_timestamp) {
                println!("  Span: {} .. {}", format_ts(oldest), format_ts(newest));
            }
            match stats.mean_ratio {
                Some(ratio) => println!("  Mean observed/predicted: {:.3}", ratio),
                None => println!("  Mean observed/predicted: n/a"),
            }
        }
        Command::Prune => {
            let removed = store.prune()?;
            println!("{} Pruned {} records", "✓".green(), removed);
        }
        Command::Clear => {
            store.clear()?;
            println!("{} Cleared store", "✓".green());
        }
    }

    Ok(())
}
