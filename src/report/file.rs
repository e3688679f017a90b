use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::ReportConfig;
use crate::domain::types::FleetReport;

use super::ReportSink;

/// Writes the report as a timestamped JSON document.
pub struct JsonFileSink {
    output_dir: PathBuf,
    filename: String,
}

impl JsonFileSink {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            filename: config.filename.clone(),
        }
    }

    pub fn path_for(&self, generated_at: DateTime<Utc>) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.json",
            self.filename,
            generated_at.format("%Y-%m-%d-%H-%M-%S")
        ))
    }

    /// Write the report and return the file path.
    pub async fn write(&self, report: &FleetReport) -> Result<PathBuf> {
        let content =
            serde_json::to_string_pretty(report).context("failed to serialize FleetReport")?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("creating directory {}", self.output_dir.display()))?;

        let path = self.path_for(report.generated_at);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!(path = %path.display(), "report file written");
        Ok(path)
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn deliver(&self, report: &FleetReport) -> Result<()> {
        self.write(report).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ComplianceState, ComplianceSummary};
    use std::collections::BTreeMap;

    fn report() -> FleetReport {
        let mut summary = ComplianceSummary::default();
        summary.record("ana@contoso.com", ComplianceState::Compliant);
        FleetReport {
            generated_at: "2026-03-01T10:30:00Z".parse().unwrap(),
            summary,
            devices: Vec::new(),
            apps: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    #[tokio::test]
    async fn writes_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(&ReportConfig {
            output_dir: dir.path().join("nested"),
            filename: "fleet".into(),
        });

        let path = sink.write(&report()).await.unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "fleet_2026-03-01-10-30-00.json"
        );
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["ana@contoso.com"]["compliant"], 1);
        assert_eq!(written["generatedAt"], "2026-03-01T10:30:00Z");
    }
}
