//! Shared setup for CLI commands: configuration, database and engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::github::{GitHubClient, GitHubConnector};
use crate::adapters::mock::MockConnector;
use crate::adapters::sqlite::{initialize_database, repositories, PoolConfig};
use crate::domain::models::{Config, Repo};
use crate::domain::ports::{Clock, PlatformConnector, Repositories, SystemClock};
use crate::infrastructure::config::ConfigLoader;
use crate::services::Engine;

pub const PROJECT_DIR: &str = ".claimwatch";
pub const CONFIG_FILE: &str = ".claimwatch/config.yaml";

/// Load configuration from `path`, or from the project hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// The config file the daemon re-reads for policy changes, if any.
pub fn policy_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => Some(path.to_path_buf()),
        None => Path::new(CONFIG_FILE).exists().then(|| PathBuf::from(CONFIG_FILE)),
    }
}

pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub repos: Repositories,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database.url(), Some(PoolConfig::from(&config.database)))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        Ok(Self {
            repos: repositories(pool.clone()),
            pool,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Build the engine.
    ///
    /// With `online` the GitHub token must be present. Offline commands only
    /// touch the database and get a connector that has no upstream state.
    pub fn engine(&self, online: bool) -> Result<Engine> {
        let connector: Arc<dyn PlatformConnector> = match GitHubClient::from_env(&self.config.github) {
            Ok(client) => Arc::new(GitHubConnector::new(client)),
            Err(e) if online => {
                return Err(e).context(format!(
                    "GitHub access requires ${}",
                    self.config.github.token_env
                ));
            }
            Err(_) => {
                tracing::debug!("no GitHub token, using offline connector");
                Arc::new(MockConnector::new())
            }
        };
        Engine::new(&self.config, self.repos.clone(), connector, self.clock.clone())
            .context("Failed to build engine")
    }

    pub async fn repo(&self, slug: &str) -> Result<Repo> {
        let (owner, name) = Repo::parse_slug(slug)?;
        self.repos
            .repos
            .get_by_slug(&owner, &name)
            .await?
            .with_context(|| format!("Repository {slug} is not tracked; add it with `claimwatch repo add {slug}`"))
    }
}
