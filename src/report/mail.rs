//! Delivery through Graph `sendMail` with the report attached.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::MailConfig;
use crate::domain::types::FleetReport;

use super::{JsonFileSink, ReportSink};

pub struct GraphMailSink {
    http: Client,
    base_url: String,
    config: MailConfig,
    token: String,
    file: JsonFileSink,
}

impl GraphMailSink {
    pub fn new(config: &MailConfig, token: String, file: JsonFileSink) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
            token,
            file,
        })
    }

    async fn send(&self, report: &FleetReport, attachment: &Path) -> Result<()> {
        let bytes = tokio::fs::read(attachment)
            .await
            .with_context(|| format!("reading {}", attachment.display()))?;
        let payload = mail_payload(&self.config, report, &bytes);

        let url = format!("{}/users/{}/sendMail", self.base_url, self.config.sender);
        self.http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()
            .context("sendMail returned error status")?;

        info!(
            sender = %self.config.sender,
            recipients = self.config.recipients.len(),
            "report mailed"
        );
        Ok(())
    }
}

#[async_trait]
impl ReportSink for GraphMailSink {
    async fn deliver(&self, report: &FleetReport) -> Result<()> {
        let path = self.file.write(report).await?;
        let sent = self.send(report, &path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove report file");
        }
        sent
    }
}

/// Build the `sendMail` request body.
pub fn mail_payload(config: &MailConfig, report: &FleetReport, attachment: &[u8]) -> Value {
    let stamp = report.generated_at.format("%Y-%m-%d_%H-%M-%S");
    let recipients: Vec<Value> = config
        .recipients
        .iter()
        .map(|address| json!({ "emailAddress": { "address": address } }))
        .collect();

    let body = format!(
        "Adjunto encontrarás el reporte.\n\nDispositivos: {}\nUsuarios: {}\nAlertas de hardware: {}\nErrores de enriquecimiento: {}",
        report.devices.len(),
        report.summary.len(),
        report.alert_count(),
        report.failures.len(),
    );

    json!({
        "message": {
            "subject": config.subject,
            "body": { "contentType": "Text", "content": body },
            "toRecipients": recipients,
            "attachments": [{
                "@odata.type": "#microsoft.graph.fileAttachment",
                "name": format!("Reporte_Dispositivos_{}.json", stamp),
                "contentType": "application/json",
                "contentBytes": STANDARD.encode(attachment),
            }],
        },
        "saveToSentItems": true,
    })
}
