//! Implementation of the `claimwatch claim` and `claimwatch release` commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Assignment, AssignmentState, Config, Issue};

#[derive(Args, Debug)]
pub struct ClaimArgs {
    /// Repository as owner/name
    pub repo: String,

    /// Issue number
    pub number: u64,

    /// Login of the claiming contributor
    pub login: String,

    /// Issue title, used when the issue is not tracked yet
    #[arg(long)]
    pub title: Option<String>,

    /// Claim time as RFC 3339 (defaults to now)
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Repository as owner/name
    pub repo: String,

    /// Issue number
    pub number: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct AssignmentOutput {
    pub repo: String,
    pub number: u64,
    pub login: String,
    pub assignment_id: Uuid,
    pub state: AssignmentState,
    pub claimed_at: DateTime<Utc>,
    pub escalation_deadline: Option<DateTime<Utc>>,
}

impl AssignmentOutput {
    fn new(repo: String, number: u64, login: String, a: &Assignment) -> Self {
        Self {
            repo,
            number,
            login,
            assignment_id: a.id,
            state: a.state,
            claimed_at: a.claimed_at,
            escalation_deadline: a.escalation_deadline,
        }
    }
}

impl CommandOutput for AssignmentOutput {
    fn to_human(&self) -> String {
        let mut line = format!(
            "{}#{} held by {}: {}",
            self.repo, self.number, self.login, self.state
        );
        if let Some(deadline) = self.escalation_deadline {
            line.push_str(&format!(" (next check {})", deadline.format("%Y-%m-%d %H:%M UTC")));
        }
        line
    }
}

pub async fn claim(args: ClaimArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let repo = ctx.repo(&args.repo).await?;
    let engine = ctx.engine(false)?;
    let now = ctx.clock.now();

    let issue = match ctx.repos.issues.get_by_number(repo.id, args.number).await? {
        Some(issue) => issue,
        None => {
            let title = args.title.clone().unwrap_or_else(|| format!("#{}", args.number));
            let issue = Issue::new(repo.id, args.number, title, now);
            ctx.repos.issues.create(&issue).await.context("Failed to track issue")?;
            issue
        }
    };

    let assignment = engine
        .claims
        .record_claim(issue.id, &args.login, args.at.unwrap_or(now))
        .await?;

    output(
        &AssignmentOutput::new(repo.slug(), issue.number, args.login.trim().to_string(), &assignment),
        json_mode,
    );
    Ok(())
}

pub async fn release(args: ReleaseArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let repo = ctx.repo(&args.repo).await?;
    let engine = ctx.engine(false)?;

    let issue = ctx
        .repos
        .issues
        .get_by_number(repo.id, args.number)
        .await?
        .with_context(|| format!("{}#{} is not tracked", repo.slug(), args.number))?;
    let live = ctx
        .repos
        .assignments
        .get_live_for_issue(issue.id)
        .await?
        .with_context(|| format!("{}#{} has no live claim", repo.slug(), args.number))?;

    let released = engine.claims.release(live.id, ctx.clock.now()).await?;
    let login = ctx
        .repos
        .contributors
        .get(released.contributor_id)
        .await?
        .map(|c| c.login)
        .unwrap_or_default();

    output(
        &AssignmentOutput::new(repo.slug(), issue.number, login, &released),
        json_mode,
    );
    Ok(())
}
