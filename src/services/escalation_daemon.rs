//! Escalation background daemon.
//!
//! Runs the tick pipeline on a fixed interval:
//! - Reloads policy defaults from the config file, when one is configured
//! - Mirrors claims, sweeps live assignments and delivers queued actions
//! - Refreshes every trust score on a slower cadence

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::models::SchedulerConfig;
use crate::infrastructure::config::ConfigLoader;
use crate::services::engine::{Engine, TickReport};

/// Configuration for the escalation daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub tick_interval: Duration,
    pub run_on_startup: bool,
    pub max_consecutive_failures: u32,
    pub score_refresh_interval: Duration,
    /// Config file whose `policy` section is re-read every tick.
    pub policy_file: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_scheduler(config: &SchedulerConfig, policy_file: Option<PathBuf>) -> Self {
        Self {
            tick_interval: Duration::from_secs(config.tick_interval_secs),
            run_on_startup: config.run_on_startup,
            max_consecutive_failures: config.max_consecutive_failures,
            score_refresh_interval: Duration::from_secs(config.score_refresh_interval_secs),
            policy_file,
        }
    }
}

/// Event emitted by the daemon.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    Started,
    TickStarted { tick: u64 },
    TickCompleted {
        tick: u64,
        report: TickReport,
        duration_ms: u64,
    },
    TickFailed { tick: u64, error: String },
    PolicyRejected { error: String },
    ScoresRefreshed { contributors: usize },
    Stopped { reason: StopReason },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_ticks: u64,
    pub successful_ticks: u64,
    pub failed_ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub total_transitions: u64,
    pub total_delivered: u64,
}

/// Handle to control a running daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Request the daemon to stop after the current tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

pub struct EscalationDaemon {
    engine: Arc<Engine>,
    config: DaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    last_refresh: Option<Instant>,
}

impl EscalationDaemon {
    pub fn new(engine: Arc<Engine>, config: DaemonConfig) -> Self {
        Self {
            engine,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            last_refresh: None,
        }
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            wake: self.wake.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the daemon, returning a channel for its events.
    pub fn run(self) -> mpsc::Receiver<DaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(mut self, tx: mpsc::Sender<DaemonEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(DaemonEvent::Started).await;
        tracing::info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            policy_file = ?self.config.policy_file,
            "escalation daemon started"
        );

        let mut consecutive_failures = 0u32;
        let mut timer = interval(self.config.tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.config.run_on_startup {
            // The first tick completes immediately.
            timer.tick().await;
        }

        let reason = loop {
            tokio::select! {
                _ = timer.tick() => {}
                () = self.wake.notified() => {}
            }
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }

            if self.run_tick(&tx).await {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
                if consecutive_failures >= self.config.max_consecutive_failures {
                    tracing::error!(consecutive_failures, "too many failed ticks, stopping daemon");
                    break StopReason::TooManyFailures;
                }
            }
        };

        self.status.write().await.running = false;
        tracing::info!(?reason, "escalation daemon stopped");
        let _ = tx.send(DaemonEvent::Stopped { reason }).await;
    }

    /// Run one tick. Returns whether the pipeline succeeded.
    async fn run_tick(&mut self, tx: &mpsc::Sender<DaemonEvent>) -> bool {
        let tick = {
            let mut status = self.status.write().await;
            status.total_ticks += 1;
            status.total_ticks
        };
        let _ = tx.send(DaemonEvent::TickStarted { tick }).await;

        self.reload_policy(tx).await;

        let start = Instant::now();
        let result = self.engine.tick().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let ok = match result {
            Ok(report) => {
                {
                    let mut status = self.status.write().await;
                    status.successful_ticks += 1;
                    status.last_tick = Some(self.engine.clock.now());
                    status.total_transitions += report.sweep.transitioned;
                    status.total_delivered += report.dispatch.delivered;
                }
                let _ = tx
                    .send(DaemonEvent::TickCompleted {
                        tick,
                        report,
                        duration_ms,
                    })
                    .await;
                true
            }
            Err(e) => {
                tracing::error!(tick, error = %e, "tick failed");
                self.status.write().await.failed_ticks += 1;
                let _ = tx
                    .send(DaemonEvent::TickFailed {
                        tick,
                        error: e.to_string(),
                    })
                    .await;
                false
            }
        };

        self.maybe_refresh_scores(tx).await;
        ok
    }

    async fn reload_policy(&self, tx: &mpsc::Sender<DaemonEvent>) {
        let Some(path) = &self.config.policy_file else {
            return;
        };
        let loaded = ConfigLoader::load_policy_from_file(path)
            .and_then(|policy| self.engine.policies.replace_defaults(policy).map_err(Into::into));
        if let Err(e) = loaded {
            tracing::warn!(path = %path.display(), error = %e, "policy reload rejected, keeping previous defaults");
            let _ = tx
                .send(DaemonEvent::PolicyRejected {
                    error: format!("{e:#}"),
                })
                .await;
        }
    }

    async fn maybe_refresh_scores(&mut self, tx: &mpsc::Sender<DaemonEvent>) {
        let due = self
            .last_refresh
            .map_or(true, |at| at.elapsed() >= self.config.score_refresh_interval);
        if !due {
            return;
        }
        self.last_refresh = Some(Instant::now());
        match self.engine.scorer.refresh_all().await {
            Ok(contributors) => {
                let _ = tx.send(DaemonEvent::ScoresRefreshed { contributors }).await;
            }
            Err(e) => tracing::warn!(error = %e, "trust refresh failed"),
        }
    }
}
