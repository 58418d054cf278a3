//! Claimwatch CLI entry point.

use clap::Parser;

use claimwatch::cli::commands::{claim, contributors, init, repo, serve, stats, sweep};
use claimwatch::cli::{context, handle_error, Cli, Commands};
use claimwatch::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let config = match context::load_config(config_path) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Held for the process lifetime so buffered file logs are flushed.
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(guard) => guard,
        Err(err) => handle_error(err, cli.json),
    };

    let json = cli.json;
    let result = match cli.command {
        Commands::Init(args) => init::execute(args, json).await,
        Commands::Serve(args) => serve::execute(args, config, config_path).await,
        Commands::Sweep(args) => sweep::execute(args, config, json).await,
        Commands::Repo(args) => repo::execute(args, config, json).await,
        Commands::Claim(args) => claim::claim(args, config, json).await,
        Commands::Release(args) => claim::release(args, config, json).await,
        Commands::Contributors(args) => contributors::list(args, config, json).await,
        Commands::Score(args) => contributors::rescore(args, config, json).await,
        Commands::Stats => stats::execute(config, json).await,
    };

    if let Err(err) = result {
        handle_error(err, json);
    }
}
