//! Read-only HTTP API.
//!
//! Exposes health, build info, top contributors, open issues and aggregate
//! counters as JSON.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::ServerConfig;
use crate::domain::ports::{Clock, Repositories};
use crate::services::stats::{self, Stats};

const DEFAULT_CONTRIBUTOR_LIMIT: usize = 10;
const DEFAULT_ISSUE_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

/// Shared state for the read API.
pub struct ReadApiState {
    pub repos: Repositories,
    pub clock: Arc<dyn Clock>,
    pub started_at: DateTime<Utc>,
}

impl ReadApiState {
    pub fn new(repos: Repositories, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            repos,
            clock,
            started_at,
        }
    }
}

pub struct ReadApiServer {
    state: Arc<ReadApiState>,
    config: ServerConfig,
}

impl ReadApiServer {
    pub fn new(state: ReadApiState, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    /// Build the router with all endpoints.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_check))
            .route("/info", get(info))
            .route("/contributors", get(list_contributors))
            .route("/issues", get(list_issues))
            .route("/stats", get(get_stats))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.router();

        tracing::info!(%addr, "read API listening");

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Error response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal(code: &str) -> impl FnOnce(DomainError) -> ApiError + '_ {
    move |e| {
        tracing::error!(error = %e, code, "read API query failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
                code: code.to_string(),
            }),
        )
    }
}

fn clamp_limit(limit: Option<usize>, default: usize) -> Result<usize, ApiError> {
    match limit {
        None => Ok(default),
        Some(0) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "limit must be at least 1".to_string(),
                code: "INVALID_LIMIT".to_string(),
            }),
        )),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContributorView {
    pub id: Uuid,
    pub login: String,
    pub trust_score: f64,
    pub confidence: f64,
    pub completed_claims: u32,
    pub abandoned_claims: u32,
    pub released_claims: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContributorsResponse {
    pub contributors: Vec<ContributorView>,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueView {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuesResponse {
    pub issues: Vec<IssueView>,
    pub total_open: u64,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "claimwatch".to_string(),
    })
}

async fn info(State(state): State<Arc<ReadApiState>>) -> Json<InfoResponse> {
    let now = state.clock.now();
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
        uptime_secs: (now - state.started_at).num_seconds().max(0),
    })
}

async fn list_contributors(
    State(state): State<Arc<ReadApiState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<ContributorsResponse>, ApiError> {
    let limit = clamp_limit(params.limit, DEFAULT_CONTRIBUTOR_LIMIT)?;
    let (list, total) = stats::top_contributors(&state.repos, limit)
        .await
        .map_err(internal("QUERY_ERROR"))?;

    Ok(Json(ContributorsResponse {
        contributors: list
            .into_iter()
            .map(|c| ContributorView {
                id: c.id,
                login: c.login,
                trust_score: c.trust_score,
                confidence: c.confidence,
                completed_claims: c.completed_claims,
                abandoned_claims: c.abandoned_claims,
                released_claims: c.released_claims,
            })
            .collect(),
        total,
    }))
}

async fn list_issues(
    State(state): State<Arc<ReadApiState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<IssuesResponse>, ApiError> {
    let limit = clamp_limit(params.limit, DEFAULT_ISSUE_LIMIT)?;
    let (list, total_open) = stats::open_issues(&state.repos, limit)
        .await
        .map_err(internal("QUERY_ERROR"))?;

    Ok(Json(IssuesResponse {
        issues: list
            .into_iter()
            .map(|i| IssueView {
                id: i.id,
                repo_id: i.repo_id,
                number: i.number,
                title: i.title,
                created_at: i.created_at,
            })
            .collect(),
        total_open,
    }))
}

async fn get_stats(State(state): State<Arc<ReadApiState>>) -> Result<Json<Stats>, ApiError> {
    stats::collect(&state.repos)
        .await
        .map(Json)
        .map_err(internal("STATS_ERROR"))
}
