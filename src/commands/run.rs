//! `mdm-report run` — one batch: token → aggregate → sinks.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::TokenProvider;
use crate::client::{GraphApi, GraphClient};
use crate::config::Config;
use crate::domain::aggregation::FleetAggregator;
use crate::domain::types::FleetReport;
use crate::report::console::OutputFormat;
use crate::report::{ConsoleSink, GraphMailSink, JsonFileSink, ReportSink};

/// Where a finished report goes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delivery {
    pub console: Option<OutputFormat>,
    pub save: bool,
    pub send: bool,
}

pub fn run(cfg: Config, delivery: Delivery) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        run_once(&cfg, delivery).await?;
        Ok(())
    })
}

pub async fn run_once(cfg: &Config, delivery: Delivery) -> Result<FleetReport> {
    cfg.require_credentials()?;
    if delivery.send {
        cfg.mail.check()?;
    }

    let token = TokenProvider::new(&cfg.graph)?
        .access_token()
        .await
        .context("acquiring Graph access token")?;
    info!("Graph access token acquired");

    let api: Arc<dyn GraphApi> = Arc::new(GraphClient::new(&cfg.graph)?);
    let report = FleetAggregator::new(api, &cfg.policy, &cfg.enrichment)
        .aggregate(&token)
        .await?;

    for sink in sinks(cfg, delivery, token)? {
        sink.deliver(&report).await?;
    }

    Ok(report)
}

fn sinks(cfg: &Config, delivery: Delivery, token: String) -> Result<Vec<Box<dyn ReportSink>>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();

    if let Some(format) = delivery.console {
        sinks.push(Box::new(ConsoleSink::new(format)));
    }
    if delivery.save {
        sinks.push(Box::new(JsonFileSink::new(&cfg.report)));
    }
    if delivery.send {
        sinks.push(Box::new(GraphMailSink::new(
            &cfg.mail,
            token,
            JsonFileSink::new(&cfg.report),
        )?));
    }

    Ok(sinks)
}
