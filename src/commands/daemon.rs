use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::Config;

use super::run::{run_once, Delivery};

pub fn run(cfg: Config, interval_secs: Option<u64>) -> Result<()> {
    let interval_secs = interval_secs.unwrap_or(cfg.schedule.interval_secs);
    if interval_secs == 0 {
        bail!("schedule interval must be greater than zero");
    }

    // Build tokio runtime explicitly (no #[tokio::main] on fn main)
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(schedule(cfg, Duration::from_secs(interval_secs)))
}

async fn schedule(cfg: Config, every: Duration) -> Result<()> {
    let delivery = Delivery {
        console: None,
        save: !cfg.mail.enabled,
        send: cfg.mail.enabled,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_secs = every.as_secs(),
        mail = cfg.mail.enabled,
        "mdm-report daemon starting"
    );

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        tokio::select! {
            _ = &mut shutdown => {
                warn!("shutdown requested during a run, abandoning it");
                break;
            }
            result = run_once(&cfg, delivery) => match result {
                Ok(report) => info!(
                    devices = report.devices.len(),
                    failures = report.failures.len(),
                    "scheduled run completed"
                ),
                Err(e) => warn!(error = %format!("{:#}", e), "scheduled run failed"),
            },
        }
    }

    info!("mdm-report daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); },
        _ = terminate => { info!("Received SIGTERM, shutting down"); },
    }
}
