//! Implementation of the `claimwatch contributors` and `claimwatch score` commands.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::context::AppContext;
use crate::cli::output::{output, score, table, truncate, CommandOutput};
use crate::domain::models::{Config, Contributor};
use crate::services::{stats, TrustScore};

#[derive(Args, Debug)]
pub struct ContributorsArgs {
    /// Maximum number of contributors to show
    #[arg(long, short, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("target").required(true).args(["login", "all"]))]
pub struct ScoreArgs {
    /// Contributor login
    pub login: Option<String>,

    /// Rescore every contributor
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ContributorsOutput {
    pub contributors: Vec<Contributor>,
    pub total: u64,
}

impl CommandOutput for ContributorsOutput {
    fn to_human(&self) -> String {
        if self.contributors.is_empty() {
            return "No contributors yet.".to_string();
        }
        let mut t = table(["LOGIN", "TRUST", "CONFIDENCE", "DONE", "ABANDONED", "RELEASED", "FIRST ACTIVITY"]);
        for c in &self.contributors {
            t.add_row(vec![
                truncate(&c.login, 24),
                score(c.trust_score),
                score(c.confidence),
                c.completed_claims.to_string(),
                c.abandoned_claims.to_string(),
                c.released_claims.to_string(),
                c.avg_time_to_first_activity_secs
                    .map_or_else(|| "-".to_string(), |secs| format!("{:.1}h", secs as f64 / 3600.0)),
            ]);
        }
        format!("{t}\nShowing {} of {} contributors", self.contributors.len(), self.total)
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum ScoreOutput {
    One { login: String, score: TrustScore },
    All {
        refreshed: usize,
    },
}

impl CommandOutput for ScoreOutput {
    fn to_human(&self) -> String {
        match self {
            Self::One { login, score: s } => format!(
                "{login}: trust {} (confidence {}), {} completed, {} abandoned, {} released",
                score(s.trust_score),
                score(s.confidence),
                s.completed,
                s.abandoned,
                s.released
            ),
            Self::All { refreshed } => format!("Rescored {refreshed} contributor(s)"),
        }
    }
}

pub async fn list(args: ContributorsArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let (contributors, total) = stats::top_contributors(&ctx.repos, args.limit.max(1)).await?;
    output(&ContributorsOutput { contributors, total }, json_mode);
    Ok(())
}

pub async fn rescore(args: ScoreArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let engine = ctx.engine(false)?;

    let result = match args.login {
        Some(login) if !args.all => {
            let contributor = ctx
                .repos
                .contributors
                .get_by_login(&login)
                .await?
                .with_context(|| format!("Unknown contributor {login}"))?;
            ScoreOutput::One {
                login: contributor.login,
                score: engine.scorer.score(contributor.id).await?,
            }
        }
        _ => ScoreOutput::All {
            refreshed: engine.scorer.refresh_all().await?,
        },
    };
    output(&result, json_mode);
    Ok(())
}
