//! Implementation of the `claimwatch stats` command.

use anyhow::Result;

use crate::cli::context::AppContext;
use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::Config;
use crate::services::{stats, Stats};

impl CommandOutput for Stats {
    fn to_human(&self) -> String {
        let mut totals = table(["COUNTER", "VALUE"]);
        for (name, value) in [
            ("repositories", self.repositories),
            ("contributors", self.contributors),
            ("issues", self.issues),
            ("open issues", self.open_issues),
            ("assigned issues", self.assigned_issues),
            ("pending actions", self.pending_actions),
            ("failed actions", self.failed_actions),
        ] {
            totals.add_row(vec![name.to_string(), value.to_string()]);
        }

        let mut states = table(["STATE", "ASSIGNMENTS"]);
        for (state, count) in &self.assignments_by_state {
            states.add_row(vec![state.clone(), count.to_string()]);
        }
        format!("{totals}\n{states}")
    }
}

pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let stats = stats::collect(&ctx.repos).await?;
    output(&stats, json_mode);
    Ok(())
}
