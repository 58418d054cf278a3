//! GitHub HTTP client with rate limiting.
//!
//! Wraps the GitHub REST API v3 endpoints the connector needs. A shared
//! `governor` limiter keeps the client under the configured hourly quota.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::domain::errors::{ConnectorError, ConnectorResult, DomainError, DomainResult};
use crate::domain::models::{GitHubConfig, IssueRef};

use super::models::{GitHubAssigneesRequest, GitHubCommentRequest, GitHubIssue, GitHubTimelineEvent};

const PER_PAGE: usize = 100;
const MAX_PAGES: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the GitHub REST API v3.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    token: String,
    api_base: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, config: &GitHubConfig) -> Self {
        let per_hour = NonZeroU32::new(config.requests_per_hour).unwrap_or(NonZeroU32::MIN);
        Self {
            http: Client::new(),
            token: token.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_hour(per_hour))),
        }
    }

    /// Create a client reading the token from the configured environment variable.
    pub fn from_env(config: &GitHubConfig) -> DomainResult<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            DomainError::ValidationFailed(format!("{} environment variable is not set", config.token_env))
        })?;
        if token.is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "{} environment variable is empty",
                config.token_env
            )));
        }
        Ok(Self::new(token, config))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "claimwatch")
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> ConnectorResult<Response> {
        self.rate_limiter.until_ready().await;

        let resp = req
            .send()
            .await
            .map_err(|e| ConnectorError::SourceUnavailable(format!("GitHub {what} request failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let rate_limited = resp
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v == "0");
        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status, rate_limited, format!("GitHub {what} returned {status}: {body}")))
    }

    async fn get_paginated<T: DeserializeOwned>(&self, path: &str, what: &str) -> ConnectorResult<Vec<T>> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let req = self
                .request(Method::GET, path)
                .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())]);
            let batch: Vec<T> = self
                .send(req, what)
                .await?
                .json()
                .await
                .map_err(|e| ConnectorError::SourceUnavailable(format!("GitHub {what} parse failed: {e}")))?;

            let last = batch.len() < PER_PAGE;
            items.extend(batch);
            if last {
                return Ok(items);
            }
        }

        tracing::warn!(what, pages = MAX_PAGES, "GitHub pagination limit reached, results truncated");
        Ok(items)
    }

    /// All issues (not pull requests) of a repository in the given state.
    pub async fn list_issues(&self, owner: &str, repo: &str, state: &str) -> ConnectorResult<Vec<GitHubIssue>> {
        let path = format!("/repos/{owner}/{repo}/issues?state={state}");
        let issues: Vec<GitHubIssue> = self.get_paginated(&path, "list_issues").await?;
        Ok(issues.into_iter().filter(|i| !i.is_pull_request()).collect())
    }

    /// The full timeline of an issue.
    pub async fn issue_timeline(&self, issue: &IssueRef) -> ConnectorResult<Vec<GitHubTimelineEvent>> {
        let path = format!("/repos/{}/{}/issues/{}/timeline", issue.owner, issue.repo, issue.number);
        self.get_paginated(&path, "issue_timeline").await
    }

    pub async fn post_comment(&self, issue: &IssueRef, body: &str) -> ConnectorResult<()> {
        let path = format!("/repos/{}/{}/issues/{}/comments", issue.owner, issue.repo, issue.number);
        let req = self.request(Method::POST, &path).json(&GitHubCommentRequest {
            body: body.to_string(),
        });
        self.send(req, "post_comment").await?;
        Ok(())
    }

    pub async fn remove_assignee(&self, issue: &IssueRef, assignee: &str) -> ConnectorResult<()> {
        let path = format!("/repos/{}/{}/issues/{}/assignees", issue.owner, issue.repo, issue.number);
        let req = self.request(Method::DELETE, &path).json(&GitHubAssigneesRequest {
            assignees: vec![assignee.to_string()],
        });
        self.send(req, "remove_assignee").await?;
        Ok(())
    }
}

/// Map a non-success status onto the connector error taxonomy.
pub(crate) fn classify_status(status: StatusCode, rate_limited: bool, message: String) -> ConnectorError {
    match status.as_u16() {
        404 | 410 => ConnectorError::NotFound(message),
        429 | 500..=599 => ConnectorError::SourceUnavailable(message),
        403 if rate_limited => ConnectorError::SourceUnavailable(message),
        code => ConnectorError::Rejected { status: code, message },
    }
}
