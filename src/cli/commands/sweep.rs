//! Implementation of the `claimwatch sweep` command.

use anyhow::Result;
use clap::Args;

use crate::cli::context::AppContext;
use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::Config;
use crate::services::TickReport;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Queue actions without delivering them
    #[arg(long)]
    pub no_dispatch: bool,

    /// Sweep stored assignments only, without contacting GitHub.
    /// Implies --no-dispatch.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct SweepOutput {
    pub offline: bool,
    pub dispatched: bool,
    #[serde(flatten)]
    pub report: TickReport,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let mut t = table(["STAGE", "RESULT"]);
        if !self.offline {
            t.add_row(vec![
                "claims".to_string(),
                format!(
                    "{} repos observed ({} failed): {} claimed, {} released, {} completed",
                    r.repos_observed, r.repos_failed, r.claims.claimed, r.claims.released, r.claims.completed
                ),
            ]);
        }
        t.add_row(vec![
            "sweep".to_string(),
            format!(
                "{} evaluated: {} transitioned, {} touched, {} deferred, {} failed, {} aborted",
                r.sweep.evaluated,
                r.sweep.transitioned,
                r.sweep.touched,
                r.sweep.deferred,
                r.sweep.failed,
                r.sweep.aborted
            ),
        ]);
        t.add_row(vec![
            "actions".to_string(),
            if self.dispatched {
                format!(
                    "{} queued, {} delivered, {} retrying, {} failed, {} superseded",
                    r.sweep.actions_enqueued,
                    r.dispatch.delivered,
                    r.dispatch.retrying,
                    r.dispatch.failed,
                    r.dispatch.obsolete
                )
            } else {
                format!("{} queued, delivery skipped", r.sweep.actions_enqueued)
            },
        ]);
        t.to_string()
    }
}

pub async fn execute(args: SweepArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    let (report, dispatched) = if args.offline {
        let engine = ctx.engine(false)?;
        let sweep = engine.scheduler.sweep().await?;
        (
            TickReport {
                sweep,
                ..TickReport::default()
            },
            false,
        )
    } else {
        let engine = ctx.engine(true)?;
        (engine.run(!args.no_dispatch).await?, !args.no_dispatch)
    };

    output(
        &SweepOutput {
            offline: args.offline,
            dispatched,
            report,
        },
        json_mode,
    );
    Ok(())
}
