//! Implementation of the `claimwatch init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::context::PROJECT_DIR;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nWrote {}/config.yaml", PROJECT_DIR));
        }
        if self.success {
            lines.push(format!("Database ready at {}", self.database_path.display()));
            lines.push("\nNext: claimwatch repo add <owner/name>".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let project_dir = target.join(PROJECT_DIR);
    let config_path = project_dir.join("config.yaml");

    if config_path.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to rewrite the config.".to_string(),
            initialized_path: target,
            config_written: false,
            database_path: PathBuf::new(),
        };
        output(&out, json_mode);
        return Ok(());
    }

    fs::create_dir_all(&project_dir)
        .await
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize default config")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let database_path = target.join(&config.database.path);
    let pool = initialize_database(&format!("sqlite:{}", database_path.display()), None)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    tracing::info!(path = %target.display(), "project initialized");

    let out = InitOutput {
        success: true,
        message: format!("Initialized claimwatch in {}", target.display()),
        initialized_path: target,
        config_written: true,
        database_path,
    };
    output(&out, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_writes_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();

        let config_path = dir.path().join(".claimwatch/config.yaml");
        let written: Config = serde_yaml::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(written.policy.grace_period_hours, 72);
        assert!(dir.path().join(".claimwatch/claimwatch.db").exists());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".claimwatch/config.yaml");
        std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        std::fs::write(&config_path, "policy:\n  grace_period_hours: 5\n").unwrap();

        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();
        assert!(std::fs::read_to_string(&config_path).unwrap().contains("grace_period_hours: 5"));
    }
}
