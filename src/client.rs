//! Typed HTTP client for the Microsoft Graph device-management API.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::warn;

use crate::config::GraphConfig;
use crate::domain::types::Device;
use crate::error::GraphError;

pub const MANAGED_DEVICES: &str = "/deviceManagement/managedDevices";

/// Authenticated GET access to the Graph API.
///
/// `path` is either relative to the configured base URL or an absolute
/// `@odata.nextLink` URL returned by a previous page.
#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn get(&self, path: &str, token: &str) -> Result<Value, GraphError>;
}

pub struct GraphClient {
    base_url: String,
    http: Client,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Resolve `path` against the base URL. Absolute links are only followed
    /// when they stay under the base URL, so the bearer token never leaves it.
    fn url_for(&self, path: &str) -> Result<String, GraphError> {
        if !(path.starts_with("http://") || path.starts_with("https://")) {
            return Ok(format!("{}{}", self.base_url, path));
        }
        match path.strip_prefix(&self.base_url) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => {
                Ok(path.to_string())
            }
            _ => Err(GraphError::ForeignLink {
                url: path.to_string(),
                base_url: self.base_url.clone(),
            }),
        }
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn get(&self, path: &str, token: &str) -> Result<Value, GraphError> {
        let url = self.url_for(path)?;
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(GraphError::Status {
                status: resp.status().as_u16(),
                retry_after: retry_after_secs(&resp),
                url,
            });
        }

        resp.json().await.map_err(|e| GraphError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored and
/// fall back to the caller's default delay.
fn retry_after_secs(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Fetch every managed device, following `@odata.nextLink` until the last page.
/// A link that was already followed ends pagination.
pub async fn list_devices(api: &dyn GraphApi, token: &str) -> Result<Vec<Device>, GraphError> {
    let mut devices = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(MANAGED_DEVICES.to_string());

    while let Some(path) = next.take() {
        let page = api.get(&path, token).await?;
        seen.insert(path.clone());
        next = match page.get("@odata.nextLink").and_then(Value::as_str) {
            Some(link) if seen.contains(link) => {
                warn!(link, pages = seen.len(), "device list links back to a fetched page, stopping");
                None
            }
            link => link.map(str::to_string),
        };
        devices.extend(value_list::<Device>(&path, page)?);
    }

    Ok(devices)
}

/// Parse a list response (`{ "value": [...] }`) into typed items.
pub fn value_list<T: serde::de::DeserializeOwned>(
    path: &str,
    body: Value,
) -> Result<Vec<T>, GraphError> {
    let items = match body {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(items).map_err(|e| GraphError::Decode {
        url: path.to_string(),
        message: e.to_string(),
    })
}
