//! Implementation of the `claimwatch repo` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{output, table, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{Config, PolicyOverride, ReminderPolicy, Repo};
use crate::services::ClaimReport;

#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommands,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// Start watching a repository
    Add {
        /// Repository as owner/name
        slug: String,
    },
    /// Show or override the reminder policy of a repository
    Policy(PolicyArgs),
    /// Mirror the repository's assignees into claims
    Sync {
        /// Repository as owner/name
        slug: String,
    },
    /// List watched repositories
    List,
}

#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Repository as owner/name
    pub slug: String,

    #[arg(long)]
    pub grace_hours: Option<i64>,

    #[arg(long)]
    pub inactivity_hours: Option<i64>,

    #[arg(long)]
    pub warning_hours: Option<i64>,

    #[arg(long)]
    pub max_reminders: Option<u32>,

    /// Remove the override and fall back to the defaults
    #[arg(long, conflicts_with_all = ["grace_hours", "inactivity_hours", "warning_hours", "max_reminders"])]
    pub clear: bool,
}

impl PolicyArgs {
    fn as_override(&self) -> PolicyOverride {
        PolicyOverride {
            grace_period_hours: self.grace_hours,
            inactivity_window_hours: self.inactivity_hours,
            warning_window_hours: self.warning_hours,
            max_reminders: self.max_reminders,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RepoOutput {
    pub slug: String,
    pub created: bool,
}

impl CommandOutput for RepoOutput {
    fn to_human(&self) -> String {
        if self.created {
            format!("Watching {}", self.slug)
        } else {
            format!("{} is already watched", self.slug)
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PolicyOutput {
    pub slug: String,
    #[serde(rename = "override")]
    pub policy_override: Option<PolicyOverride>,
    pub effective: ReminderPolicy,
}

impl CommandOutput for PolicyOutput {
    fn to_human(&self) -> String {
        let overridden = |set: bool| if set { "override" } else { "default" };
        let o = self.policy_override.unwrap_or_default();
        let mut t = table(["SETTING", "VALUE", "SOURCE"]);
        t.add_row(vec![
            "grace period".to_string(),
            format!("{}h", self.effective.grace_period_hours),
            overridden(o.grace_period_hours.is_some()).to_string(),
        ]);
        t.add_row(vec![
            "inactivity window".to_string(),
            format!("{}h", self.effective.inactivity_window_hours),
            overridden(o.inactivity_window_hours.is_some()).to_string(),
        ]);
        t.add_row(vec![
            "warning window".to_string(),
            format!("{}h", self.effective.warning_window_hours),
            overridden(o.warning_window_hours.is_some()).to_string(),
        ]);
        t.add_row(vec![
            "max reminders".to_string(),
            self.effective.max_reminders.to_string(),
            overridden(o.max_reminders.is_some()).to_string(),
        ]);
        format!("Policy for {}\n{t}", self.slug)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SyncOutput {
    pub slug: String,
    #[serde(flatten)]
    pub report: ClaimReport,
}

impl CommandOutput for SyncOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        format!(
            "Synced {}: {} claimed, {} released, {} completed, {} unchanged, {} failed",
            self.slug, r.claimed, r.released, r.completed, r.unchanged, r.failed
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RepoListOutput {
    pub repositories: Vec<Repo>,
}

impl CommandOutput for RepoListOutput {
    fn to_human(&self) -> String {
        if self.repositories.is_empty() {
            return "No repositories watched.".to_string();
        }
        let mut t = table(["REPOSITORY", "POLICY", "ADDED"]);
        for repo in &self.repositories {
            let policy = match &repo.policy {
                Some(p) if !p.is_empty() => "override",
                _ => "default",
            };
            t.add_row(vec![
                repo.slug(),
                policy.to_string(),
                repo.created_at.format("%Y-%m-%d").to_string(),
            ]);
        }
        t.to_string()
    }
}

pub async fn execute(args: RepoArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        RepoCommands::Add { slug } => {
            let (owner, name) = Repo::parse_slug(&slug)?;
            let repo = Repo::new(owner, name, ctx.clock.now());
            let created = match ctx.repos.repos.create(&repo).await {
                Ok(()) => true,
                Err(DomainError::ValidationFailed(_)) => false,
                Err(e) => return Err(e).context("Failed to add repository"),
            };
            if created {
                tracing::info!(repo = %repo.slug(), "repository added");
            }
            output(&RepoOutput { slug: repo.slug(), created }, json_mode);
        }
        RepoCommands::Policy(policy_args) => {
            let repo = ctx.repo(&policy_args.slug).await?;
            let engine = ctx.engine(false)?;
            let requested = policy_args.as_override();

            let policy_override = if policy_args.clear {
                ctx.repos.repos.set_policy(repo.id, None).await?;
                None
            } else if requested.is_empty() {
                repo.policy
            } else {
                // Merge into the stored override so flags can be set one at a time.
                let stored = repo.policy.unwrap_or_default();
                let merged = PolicyOverride {
                    grace_period_hours: requested.grace_period_hours.or(stored.grace_period_hours),
                    inactivity_window_hours: requested
                        .inactivity_window_hours
                        .or(stored.inactivity_window_hours),
                    warning_window_hours: requested.warning_window_hours.or(stored.warning_window_hours),
                    max_reminders: requested.max_reminders.or(stored.max_reminders),
                };
                engine.policies.validate_override(&merged)?;
                ctx.repos.repos.set_policy(repo.id, Some(merged)).await?;
                tracing::info!(repo = %repo.slug(), ?merged, "policy override updated");
                Some(merged)
            };

            let effective = engine.policies.resolve(policy_override.as_ref());
            output(
                &PolicyOutput {
                    slug: repo.slug(),
                    policy_override,
                    effective,
                },
                json_mode,
            );
        }
        RepoCommands::Sync { slug } => {
            let repo = ctx.repo(&slug).await?;
            let engine = ctx.engine(true)?;
            let report = engine.claims.observe_claims(repo.id).await?;
            output(&SyncOutput { slug: repo.slug(), report }, json_mode);
        }
        RepoCommands::List => {
            let repositories = ctx.repos.repos.list().await?;
            output(&RepoListOutput { repositories }, json_mode);
        }
    }
    Ok(())
}
