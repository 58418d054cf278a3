use serde::{Deserialize, Serialize};

use super::policy::ReminderPolicy;

/// Main configuration structure for claimwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Escalation scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Retry policy for transient connector failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Default reminder policy (repositories may override per field)
    #[serde(default)]
    pub policy: ReminderPolicy,

    /// How trust stretches or shrinks the policy windows
    #[serde(default)]
    pub trust_scaling: TrustScalingConfig,

    /// Trust scoring parameters
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// GitHub connector configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Read API server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Outbound action delivery configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".claimwatch/claimwatch.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Escalation scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds between sweeps
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Maximum assignments evaluated concurrently
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Upper bound for one assignment's evaluation, fetch included
    #[serde(default = "default_assignment_timeout_secs")]
    pub assignment_timeout_secs: u64,

    /// Upper bound for a whole sweep; remaining work retries next tick
    #[serde(default = "default_sweep_deadline_secs")]
    pub sweep_deadline_secs: u64,

    /// Seconds between full trust score refreshes
    #[serde(default = "default_score_refresh_interval_secs")]
    pub score_refresh_interval_secs: u64,

    /// Local retries of one transition after a version conflict
    #[serde(default = "default_max_transition_retries")]
    pub max_transition_retries: u32,

    /// Sweep immediately when the daemon starts
    #[serde(default = "default_true")]
    pub run_on_startup: bool,

    /// Failed ticks in a row before the daemon gives up
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

const fn default_tick_interval_secs() -> u64 {
    3600
}

const fn default_concurrency_limit() -> usize {
    8
}

const fn default_assignment_timeout_secs() -> u64 {
    60
}

const fn default_sweep_deadline_secs() -> u64 {
    900
}

const fn default_score_refresh_interval_secs() -> u64 {
    86_400
}

const fn default_max_transition_retries() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

const fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            concurrency_limit: default_concurrency_limit(),
            assignment_timeout_secs: default_assignment_timeout_secs(),
            sweep_deadline_secs: default_sweep_deadline_secs(),
            score_refresh_interval_secs: default_score_refresh_interval_secs(),
            max_transition_retries: default_max_transition_retries(),
            run_on_startup: default_true(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch within one tick
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Multiplier range applied to grace and inactivity windows.
///
/// Trust 0.0 maps to `min_factor`, trust 1.0 to `max_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrustScalingConfig {
    #[serde(default = "default_min_factor")]
    pub min_factor: f64,

    #[serde(default = "default_max_factor")]
    pub max_factor: f64,
}

const fn default_min_factor() -> f64 {
    0.5
}

const fn default_max_factor() -> f64 {
    1.5
}

impl Default for TrustScalingConfig {
    fn default() -> Self {
        Self {
            min_factor: default_min_factor(),
            max_factor: default_max_factor(),
        }
    }
}

/// Trust scoring parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    /// Weight of the completion ratio
    #[serde(default = "default_completion_weight")]
    pub completion_weight: f64,

    /// Weight of the responsiveness term
    #[serde(default = "default_responsiveness_weight")]
    pub responsiveness_weight: f64,

    /// Responsiveness decay constant, in hours
    #[serde(default = "default_tau_hours")]
    pub tau_hours: f64,

    /// Resolved claims needed for full confidence
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u32,

    /// Score contributors are pulled toward with little history
    #[serde(default = "default_prior")]
    pub prior: f64,
}

const fn default_completion_weight() -> f64 {
    0.7
}

const fn default_responsiveness_weight() -> f64 {
    0.3
}

const fn default_tau_hours() -> f64 {
    48.0
}

const fn default_volume_threshold() -> u32 {
    10
}

const fn default_prior() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            completion_weight: default_completion_weight(),
            responsiveness_weight: default_responsiveness_weight(),
            tau_hours: default_tau_hours(),
            volume_threshold: default_volume_threshold(),
            prior: default_prior(),
        }
    }
}

/// GitHub connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitHubConfig {
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Authenticated request budget per hour
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

const fn default_requests_per_hour() -> u32 {
    5_000
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

/// Read API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: default_true(),
        }
    }
}

/// Outbound action delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchConfig {
    /// Pending actions delivered per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delivery attempts before an action is marked failed
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
}

const fn default_batch_size() -> usize {
    50
}

const fn default_max_delivery_attempts() -> u32 {
    5
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_delivery_attempts: default_max_delivery_attempts(),
        }
    }
}
