//! Report sinks — everything that happens to a `FleetReport` after aggregation.

pub mod console;
pub mod file;
pub mod mail;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::types::FleetReport;

pub use console::ConsoleSink;
pub use file::JsonFileSink;
pub use mail::GraphMailSink;

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &FleetReport) -> Result<()>;
}

/// Human-readable size using decimal units. `None` renders as `N/A`.
pub fn fmt_bytes(bytes: Option<u64>) -> String {
    match bytes {
        None => "N/A".to_string(),
        Some(b) if b >= 1_000_000_000 => format!("{} GB", b / 1_000_000_000),
        Some(b) if b >= 1_000_000 => format!("{} MB", b / 1_000_000),
        Some(b) => format!("{} Bytes", b),
    }
}

/// Comma-separated `name version` entries for a device, or `N/A` without
/// an inventory.
pub fn app_names(report: &FleetReport, device_id: &str) -> String {
    match report.apps_for(device_id) {
        Some(apps) if !apps.is_empty() => apps
            .iter()
            .map(|a| match a.version.as_deref() {
                Some(version) if !version.is_empty() => format!("{} {}", a.display_name, version),
                _ => a.display_name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(_) => "(none)".to_string(),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ComplianceSummary, InstalledApp};
    use std::collections::BTreeMap;

    #[test]
    fn formats_sizes_like_the_report() {
        assert_eq!(fmt_bytes(None), "N/A");
        assert_eq!(fmt_bytes(Some(0)), "0 Bytes");
        assert_eq!(fmt_bytes(Some(4_000_000_000)), "4 GB");
        assert_eq!(fmt_bytes(Some(512_000_000_000)), "512 GB");
        assert_eq!(fmt_bytes(Some(750_500_000)), "750 MB");
        assert_eq!(fmt_bytes(Some(999)), "999 Bytes");
    }

    #[test]
    fn app_column_lists_names_with_versions() {
        let app = |name: &str, version: Option<&str>| InstalledApp {
            display_name: name.to_string(),
            version: version.map(str::to_string),
            device_id: "ios-1".to_string(),
        };
        let mut apps = BTreeMap::new();
        apps.insert(
            "ios-1".to_string(),
            vec![app("Slack", Some("23.1")), app("Notes", None)],
        );
        apps.insert("ios-2".to_string(), Vec::new());
        let report = FleetReport {
            generated_at: chrono::Utc::now(),
            summary: ComplianceSummary::default(),
            devices: Vec::new(),
            apps,
            failures: Vec::new(),
        };

        assert_eq!(app_names(&report, "ios-1"), "Slack 23.1, Notes");
        assert_eq!(app_names(&report, "ios-2"), "(none)");
        assert_eq!(app_names(&report, "win-1"), "N/A");
    }
}
