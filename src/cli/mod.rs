//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    claim::{ClaimArgs, ReleaseArgs},
    contributors::{ContributorsArgs, ScoreArgs},
    init::InitArgs,
    repo::RepoArgs,
    serve::ServeArgs,
    sweep::SweepArgs,
};

#[derive(Parser, Debug)]
#[command(name = "claimwatch")]
#[command(about = "Detects abandoned issue claims and escalates reminders", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file (defaults to .claimwatch/config.yaml and local.yaml)
    #[arg(short, long, global = true, env = "CLAIMWATCH_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the project directory, default config and database
    Init(InitArgs),
    /// Run the escalation daemon and the read API
    Serve(ServeArgs),
    /// Run one tick: mirror claims, sweep assignments, deliver actions
    Sweep(SweepArgs),
    /// Manage tracked repositories
    Repo(RepoArgs),
    /// Record a claim on an issue
    Claim(ClaimArgs),
    /// Release a claim on an issue
    Release(ReleaseArgs),
    /// List contributors by trust
    Contributors(ContributorsArgs),
    /// Recompute trust scores
    Score(ScoreArgs),
    /// Show aggregate counters
    Stats,
}

#[derive(Debug, serde::Serialize)]
struct ErrorOutput {
    error: String,
}

/// Print an error in the requested format and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = ErrorOutput {
            error: format!("{err:#}"),
        };
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
