//! Aggregate counters shared by the `stats` command and the read API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActionStatus, AssignmentState, Contributor, Issue};
use crate::domain::ports::{ContributorFilter, IssueFilter, Repositories};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub contributors: u64,
    pub repositories: u64,
    pub issues: u64,
    pub open_issues: u64,
    /// Issues held by a live assignment.
    pub assigned_issues: u64,
    /// Every state is present, zero included.
    pub assignments_by_state: BTreeMap<String, u64>,
    pub pending_actions: u64,
    pub failed_actions: u64,
}

pub async fn collect(repos: &Repositories) -> DomainResult<Stats> {
    let by_state = repos.assignments.count_by_state().await?;
    let by_status = repos.outbound.count_by_status().await?;

    let assignments_by_state = AssignmentState::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), by_state.get(s).copied().unwrap_or(0)))
        .collect();
    let assigned_issues = AssignmentState::ALL
        .iter()
        .filter(|s| !s.is_terminal())
        .map(|s| by_state.get(s).copied().unwrap_or(0))
        .sum();

    Ok(Stats {
        contributors: repos.contributors.count().await?,
        repositories: repos.repos.count().await?,
        issues: repos.issues.count(IssueFilter::default()).await?,
        open_issues: repos.issues.count(IssueFilter::open()).await?,
        assigned_issues,
        assignments_by_state,
        pending_actions: by_status.get(&ActionStatus::Pending).copied().unwrap_or(0),
        failed_actions: by_status.get(&ActionStatus::Failed).copied().unwrap_or(0),
    })
}

/// Top contributors by trust with the total count.
pub async fn top_contributors(
    repos: &Repositories,
    limit: usize,
) -> DomainResult<(Vec<Contributor>, u64)> {
    let list = repos
        .contributors
        .list(ContributorFilter { limit: Some(limit) })
        .await?;
    Ok((list, repos.contributors.count().await?))
}

/// Newest open issues with the total open count.
pub async fn open_issues(
    repos: &Repositories,
    limit: usize,
) -> DomainResult<(Vec<Issue>, u64)> {
    let list = repos
        .issues
        .list(IssueFilter {
            limit: Some(limit),
            ..IssueFilter::open()
        })
        .await?;
    Ok((list, repos.issues.count(IssueFilter::open()).await?))
}
