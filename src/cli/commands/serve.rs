//! Implementation of the `claimwatch serve` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::oneshot;

use crate::adapters::http::{ReadApiServer, ReadApiState};
use crate::cli::context::{policy_file, AppContext};
use crate::domain::models::Config;
use crate::services::{DaemonConfig, DaemonEvent, EscalationDaemon, StopReason};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Run the daemon without the read API
    #[arg(long)]
    pub no_api: bool,

    /// Override the read API port
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn execute(args: ServeArgs, mut config: Config, config_path: Option<&Path>) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let ctx = AppContext::open(config).await?;
    let engine = Arc::new(ctx.engine(true)?);

    let daemon = EscalationDaemon::new(
        engine.clone(),
        DaemonConfig::from_scheduler(&ctx.config.scheduler, policy_file(config_path)),
    );
    let handle = daemon.handle();
    let mut events = daemon.run();

    let (api_stop_tx, api_stop_rx) = oneshot::channel::<()>();
    let api = if args.no_api {
        None
    } else {
        let server = ReadApiServer::new(
            ReadApiState::new(ctx.repos.clone(), ctx.clock.clone()),
            ctx.config.server.clone(),
        );
        Some(tokio::spawn(async move {
            server
                .serve_with_shutdown(async move {
                    let _ = api_stop_rx.await;
                })
                .await
        }))
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;
    let mut stop_reason = None;

    loop {
        tokio::select! {
            result = &mut ctrl_c, if !stopping => {
                result.context("Failed to listen for ctrl-c")?;
                tracing::info!("shutdown requested");
                stopping = true;
                handle.stop();
            }
            event = events.recv() => match event {
                Some(DaemonEvent::TickCompleted { tick, report, duration_ms }) => {
                    tracing::info!(
                        tick,
                        duration_ms,
                        transitioned = report.sweep.transitioned,
                        delivered = report.dispatch.delivered,
                        "tick completed"
                    );
                }
                Some(DaemonEvent::TickFailed { tick, error }) => {
                    tracing::warn!(tick, %error, "tick failed");
                }
                Some(DaemonEvent::Stopped { reason }) => {
                    stop_reason = Some(reason);
                    break;
                }
                Some(DaemonEvent::PolicyRejected { error }) => {
                    tracing::warn!(%error, "policy reload rejected, keeping previous policy");
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    let _ = api_stop_tx.send(());
    if let Some(api) = api {
        match api.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(anyhow::anyhow!("read API failed: {e}")),
            Err(e) => return Err(e).context("read API task panicked"),
        }
    }

    let status = handle.status().await;
    tracing::info!(
        total_ticks = status.total_ticks,
        failed_ticks = status.failed_ticks,
        total_transitions = status.total_transitions,
        total_delivered = status.total_delivered,
        "serve finished"
    );
    ctx.pool.close().await;

    if stop_reason == Some(StopReason::TooManyFailures) {
        anyhow::bail!("daemon stopped after {} consecutive failed ticks", ctx.config.scheduler.max_consecutive_failures);
    }
    Ok(())
}
