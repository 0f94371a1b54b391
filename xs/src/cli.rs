//! CLI argument parsing for experiencestore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "xs")]
#[command(author, version, about = "Durable store of predicted vs. observed action costs", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the store directory
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Append a record
    Append {
        /// Task type (e.g. "book-flight-hotel")
        #[arg(required = true)]
        task_type: String,

        /// Action descriptor as it was planned
        #[arg(required = true)]
        action: String,

        /// Cost the planner predicted
        #[arg(short, long)]
        predicted: u64,

        /// Cost that was actually observed
        #[arg(short, long)]
        observed: u64,
    },

    /// Show records most similar to an action, newest first
    Query {
        #[arg(required = true)]
        task_type: String,

        #[arg(required = true)]
        action: String,

        /// Maximum results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Skip records less similar than this (0.0 - 1.0)
        #[arg(long, default_value = "0.0")]
        min_similarity: f64,
    },

    /// List records, newest last
    List {
        /// Only show the last N records
        #[arg(short, long)]
        tail: Option<usize>,
    },

    /// Show store statistics
    Stats,

    /// Drop records past capacity or older than max-age-days
    Prune,

    /// Delete all records
    Clear,
}
