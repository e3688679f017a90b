//! Device enrichment — per-device follow-up queries.
//!
//! For each device the full record is re-read by id, then:
//! - Windows: `physicalMemoryInBytes` is fetched through a `$select` query
//!   (the list endpoint reports it as zero)
//! - iOS: the detected-app inventory is fetched, retrying on 429
//!
//! Every failure here is local to the device: it is logged, recorded, and the
//! device is still returned with explicit defaults.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{value_list, GraphApi, MANAGED_DEVICES};
use crate::config::EnrichmentConfig;
use crate::error::GraphError;

use super::allow_list::AllowList;
use super::types::{Device, DeviceFailure, FailureStage, InstalledApp};

/// Outcome of enriching one device.
#[derive(Debug)]
pub struct Enrichment {
    pub device: Device,
    /// `None` for platforms without app inventories, or when the fetch
    /// never succeeded.
    pub apps: Option<Vec<InstalledApp>>,
    pub failures: Vec<DeviceFailure>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedApp {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Clone)]
pub struct DeviceEnricher {
    api: Arc<dyn GraphApi>,
    allow_list: Arc<AllowList>,
    max_attempts: u32,
    default_retry_after: Duration,
}

impl DeviceEnricher {
    pub fn new(api: Arc<dyn GraphApi>, allow_list: Arc<AllowList>, config: &EnrichmentConfig) -> Self {
        Self {
            api,
            allow_list,
            max_attempts: config.max_attempts,
            default_retry_after: Duration::from_secs(config.default_retry_after_secs),
        }
    }

    pub async fn enrich(&self, listed: Device, token: &str) -> Enrichment {
        let device_id = listed.id.clone();
        let mut failures = Vec::new();

        let mut device = match self.fetch_detail(&device_id, token).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "device detail fetch failed, keeping list record");
                failures.push(failure(&device_id, FailureStage::Detail, &e));
                listed
            }
        };

        device.physical_memory_in_bytes = if device.platform.reports_memory() {
            match self.fetch_memory(&device_id, token).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(device_id = %device_id, error = %e, "memory fetch failed, reporting 0");
                    failures.push(failure(&device_id, FailureStage::Memory, &e));
                    Some(0)
                }
            }
        } else {
            None
        };

        let apps = if device.platform.reports_apps() {
            match self.fetch_apps(&device_id, token).await {
                Ok(Some(apps)) => Some(apps),
                Ok(None) => {
                    failures.push(DeviceFailure {
                        device_id: device_id.clone(),
                        stage: FailureStage::AppsRateLimited,
                        message: format!(
                            "still throttled after {} attempts",
                            self.max_attempts
                        ),
                    });
                    None
                }
                Err(e) => {
                    warn!(device_id = %device_id, error = %e, "app inventory fetch failed");
                    failures.push(failure(&device_id, FailureStage::Apps, &e));
                    None
                }
            }
        } else {
            None
        };

        Enrichment {
            device,
            apps,
            failures,
        }
    }

    async fn fetch_detail(&self, device_id: &str, token: &str) -> Result<Device, GraphError> {
        let path = device_path(device_id);
        let body = self.api.get(&path, token).await?;
        debug!(device_id, "fetched device detail");
        serde_json::from_value(body).map_err(|e| GraphError::Decode {
            url: path,
            message: e.to_string(),
        })
    }

    async fn fetch_memory(&self, device_id: &str, token: &str) -> Result<u64, GraphError> {
        let path = format!("{}?$select=physicalMemoryInBytes", device_path(device_id));
        let body = self.api.get(&path, token).await?;
        body.get("physicalMemoryInBytes")
            .and_then(|v| v.as_i64())
            .map(|bytes| bytes.max(0) as u64)
            .ok_or_else(|| GraphError::Decode {
                url: path,
                message: "missing physicalMemoryInBytes".to_string(),
            })
    }

    /// Fetch the detected-app inventory, backing off on 429.
    ///
    /// Returns `Ok(None)` when every attempt was throttled, and the error
    /// itself for any other failure (no retry).
    pub async fn fetch_apps(
        &self,
        device_id: &str,
        token: &str,
    ) -> Result<Option<Vec<InstalledApp>>, GraphError> {
        let path = format!("{}/detectedApps", device_path(device_id));

        for attempt in 1..=self.max_attempts {
            match self.api.get(&path, token).await {
                Ok(body) => {
                    let detected: Vec<DetectedApp> = value_list(&path, body)?;
                    let apps = detected
                        .into_iter()
                        .map(|app| InstalledApp {
                            display_name: app.display_name,
                            version: app.version,
                            device_id: device_id.to_string(),
                        })
                        .collect();
                    return Ok(Some(self.allow_list.filter(apps)));
                }
                Err(e) if e.is_rate_limited() => {
                    if attempt == self.max_attempts {
                        break;
                    }
                    let delay = e
                        .retry_after()
                        .map(Duration::from_secs)
                        .unwrap_or(self.default_retry_after);
                    info!(
                        device_id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "app inventory throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            device_id,
            attempts = self.max_attempts,
            "app inventory still throttled, giving up"
        );
        Ok(None)
    }
}

fn device_path(device_id: &str) -> String {
    format!("{}/{}", MANAGED_DEVICES, device_id)
}

fn failure(device_id: &str, stage: FailureStage, error: &GraphError) -> DeviceFailure {
    DeviceFailure {
        device_id: device_id.to_string(),
        stage,
        message: error.to_string(),
    }
}
