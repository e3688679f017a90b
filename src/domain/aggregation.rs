//! Fleet aggregation — one batch run over the managed-device list.
//!
//! Pipeline:
//!   device list → compliance summary → bounded enrichment → hardware policy → FleetReport
//!
//! All accumulation is local to one `aggregate` call.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::client::{list_devices, GraphApi};
use crate::config::{EnrichmentConfig, PolicyConfig};

use super::allow_list::AllowList;
use super::enrichment::{DeviceEnricher, Enrichment};
use super::hardware::{evaluate, ThresholdMap};
use super::types::{
    ComplianceSummary, Device, DeviceFailure, DeviceRecord, FailureStage, FleetReport,
};

pub struct FleetAggregator {
    api: Arc<dyn GraphApi>,
    enricher: DeviceEnricher,
    thresholds: ThresholdMap,
    concurrency: usize,
}

impl FleetAggregator {
    pub fn new(api: Arc<dyn GraphApi>, policy: &PolicyConfig, enrichment: &EnrichmentConfig) -> Self {
        let allow_list = Arc::new(AllowList::new(policy.allow_list.iter().cloned()));
        Self {
            enricher: DeviceEnricher::new(api.clone(), allow_list, enrichment),
            api,
            thresholds: policy.thresholds.clone(),
            concurrency: enrichment.concurrency.max(1),
        }
    }

    /// Run one aggregation. Only a failure to read the device list is fatal.
    pub async fn aggregate(&self, token: &str) -> Result<FleetReport> {
        let devices = list_devices(self.api.as_ref(), token)
            .await
            .context("fetching managed device list")?;
        info!(count = devices.len(), "fetched managed devices");

        let summary = summarize(&devices);
        info!(users = summary.len(), "built compliance summary");

        let enrichments = self.enrich_all(devices, token).await;

        let mut report = FleetReport {
            generated_at: Utc::now(),
            summary,
            devices: Vec::with_capacity(enrichments.len()),
            apps: BTreeMap::new(),
            failures: Vec::new(),
        };

        for enrichment in enrichments {
            if let Some(apps) = enrichment.apps {
                report.apps.insert(enrichment.device.id.clone(), apps);
            }
            report.failures.extend(enrichment.failures);

            let hardware_alert = evaluate(&enrichment.device, &self.thresholds);
            report.devices.push(DeviceRecord {
                device: enrichment.device,
                hardware_alert,
            });
        }

        info!(
            devices = report.devices.len(),
            app_inventories = report.apps.len(),
            hardware_alerts = report.alert_count(),
            failures = report.failures.len(),
            "fleet aggregation completed"
        );

        Ok(report)
    }

    /// Enrich every device on a bounded pool. Results keep the order of the
    /// device list; a task that dies still yields its listed device.
    async fn enrich_all(&self, devices: Vec<Device>, token: &str) -> Vec<Enrichment> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let token: Arc<str> = Arc::from(token);
        let mut tasks = JoinSet::new();

        for (index, device) in devices.iter().cloned().enumerate() {
            let enricher = self.enricher.clone();
            let semaphore = semaphore.clone();
            let token = token.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, enricher.enrich(device, &token).await)
            });
        }

        let mut slots: Vec<Option<Enrichment>> = (0..devices.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, enrichment)) => slots[index] = Some(enrichment),
                Err(e) => warn!(error = %e, "enrichment task aborted, keeping list record"),
            }
        }

        slots
            .into_iter()
            .zip(devices)
            .map(|(slot, listed)| slot.unwrap_or_else(|| aborted(listed)))
            .collect()
    }
}

/// Fallback for a device whose enrichment task never returned: the list
/// record with the same defaults a failed memory or app fetch would leave.
fn aborted(mut device: Device) -> Enrichment {
    device.physical_memory_in_bytes = device.platform.reports_memory().then_some(0);
    let failure = DeviceFailure {
        device_id: device.id.clone(),
        stage: FailureStage::Aborted,
        message: "enrichment task did not complete".to_string(),
    };
    Enrichment {
        device,
        apps: None,
        failures: vec![failure],
    }
}

/// Count compliant / noncompliant devices per user. Unknown and missing
/// states count as noncompliant.
pub fn summarize(devices: &[Device]) -> ComplianceSummary {
    let mut summary = ComplianceSummary::default();
    for device in devices {
        summary.record(&device.user_principal_name, device.compliance_state);
    }
    summary
}
