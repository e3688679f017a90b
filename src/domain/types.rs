//! Report model — devices, apps, and the aggregates handed to report sinks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_USER: &str = "Unknown User";

/// Platform family, normalized once where the raw `operatingSystem` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Ios,
    Other,
}

impl OsFamily {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "windows" => Self::Windows,
            "ios" => Self::Ios,
            _ => Self::Other,
        }
    }

    /// Whether the API exposes `physicalMemoryInBytes` for this platform.
    pub fn reports_memory(self) -> bool {
        self == Self::Windows
    }

    /// Whether the API exposes `detectedApps` inventories for this platform.
    pub fn reports_apps(self) -> bool {
        self == Self::Ios
    }
}

/// Upstream compliance state. Anything other than the two known values,
/// including a missing field, is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceState {
    Compliant,
    Noncompliant,
    Unknown,
}

impl ComplianceState {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("compliant") => Self::Compliant,
            Some("noncompliant") => Self::Noncompliant,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::Noncompliant => "noncompliant",
            Self::Unknown => "unknown",
        }
    }
}

/// Managed device as reported by `deviceManagement/managedDevices`.
///
/// `physical_memory_in_bytes` is `None` for platforms that never report memory,
/// so "not applicable" stays distinct from a failed lookup (`Some(0)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawDevice")]
pub struct Device {
    pub id: String,
    pub user_principal_name: String,
    pub device_name: Option<String>,
    pub operating_system: String,
    pub platform: OsFamily,
    pub compliance_state: ComplianceState,
    pub total_storage_space_in_bytes: u64,
    pub free_storage_space_in_bytes: u64,
    pub physical_memory_in_bytes: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDevice {
    id: String,
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    operating_system: Option<String>,
    #[serde(default)]
    compliance_state: Option<String>,
    #[serde(default)]
    total_storage_space_in_bytes: Option<i64>,
    #[serde(default)]
    free_storage_space_in_bytes: Option<i64>,
    #[serde(default)]
    physical_memory_in_bytes: Option<i64>,
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        let operating_system = raw.operating_system.unwrap_or_default();
        let platform = OsFamily::from_raw(&operating_system);
        let physical_memory_in_bytes = platform
            .reports_memory()
            .then(|| non_negative(raw.physical_memory_in_bytes));

        Self {
            id: raw.id,
            user_principal_name: raw
                .user_principal_name
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            device_name: raw.device_name.filter(|n| !n.is_empty()),
            operating_system,
            platform,
            compliance_state: ComplianceState::from_raw(raw.compliance_state.as_deref()),
            total_storage_space_in_bytes: non_negative(raw.total_storage_space_in_bytes),
            free_storage_space_in_bytes: non_negative(raw.free_storage_space_in_bytes),
            physical_memory_in_bytes,
        }
    }
}

fn non_negative(v: Option<i64>) -> u64 {
    v.unwrap_or(0).max(0) as u64
}

/// An application detected on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub display_name: String,
    pub version: Option<String>,
    pub device_id: String,
}

/// Per-user compliance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserCompliance {
    pub compliant: u32,
    pub noncompliant: u32,
}

/// Compliance counters keyed by user principal name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ComplianceSummary(BTreeMap<String, UserCompliance>);

impl ComplianceSummary {
    /// Count one device. Only `Compliant` is counted as compliant; unknown
    /// states fall into the noncompliant bucket.
    pub fn record(&mut self, user: &str, state: ComplianceState) {
        let entry = self.0.entry(user.to_string()).or_default();
        match state {
            ComplianceState::Compliant => entry.compliant += 1,
            ComplianceState::Noncompliant | ComplianceState::Unknown => entry.noncompliant += 1,
        }
    }

    pub fn get(&self, user: &str) -> Option<&UserCompliance> {
        self.0.get(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &UserCompliance)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Hardware sufficiency annotation for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareAlert {
    pub ram_insufficient: bool,
    pub storage_insufficient: bool,
    pub text: String,
}

impl HardwareAlert {
    pub fn ok() -> Self {
        Self {
            ram_insufficient: false,
            storage_insufficient: false,
            text: "OK".to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.ram_insufficient && !self.storage_insufficient
    }
}

/// Which enrichment step failed for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Detail,
    Memory,
    Apps,
    AppsRateLimited,
    /// The enrichment task itself died (panic or cancellation).
    Aborted,
}

/// A non-fatal enrichment failure, kept in the report for visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFailure {
    pub device_id: String,
    pub stage: FailureStage,
    pub message: String,
}

/// An enriched device together with its hardware evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub device: Device,
    pub hardware_alert: HardwareAlert,
}

/// Result of one aggregation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ComplianceSummary,
    pub devices: Vec<DeviceRecord>,
    pub apps: BTreeMap<String, Vec<InstalledApp>>,
    pub failures: Vec<DeviceFailure>,
}

impl FleetReport {
    pub fn apps_for(&self, device_id: &str) -> Option<&[InstalledApp]> {
        self.apps.get(device_id).map(Vec::as_slice)
    }

    pub fn alert_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|r| !r.hardware_alert.is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_normalizes_platform_and_defaults() {
        let d: Device = serde_json::from_value(json!({
            "id": "d1",
            "operatingSystem": "WINDOWS",
            "totalStorageSpaceInBytes": 500_000_000_000i64,
        }))
        .unwrap();

        assert_eq!(d.platform, OsFamily::Windows);
        assert_eq!(d.user_principal_name, UNKNOWN_USER);
        assert_eq!(d.compliance_state, ComplianceState::Unknown);
        assert_eq!(d.physical_memory_in_bytes, Some(0));
        assert_eq!(d.free_storage_space_in_bytes, 0);
    }

    #[test]
    fn non_windows_memory_is_not_applicable() {
        let d: Device = serde_json::from_value(json!({
            "id": "d2",
            "userPrincipalName": "ana@contoso.com",
            "operatingSystem": "iOS",
            "complianceState": "compliant",
            "physicalMemoryInBytes": 4_000_000_000i64,
        }))
        .unwrap();

        assert_eq!(d.platform, OsFamily::Ios);
        assert_eq!(d.physical_memory_in_bytes, None);
        assert_eq!(d.compliance_state, ComplianceState::Compliant);
    }

    #[test]
    fn empty_user_falls_back_to_sentinel() {
        let d: Device = serde_json::from_value(json!({
            "id": "d3",
            "userPrincipalName": "",
            "operatingSystem": "Android",
        }))
        .unwrap();
        assert_eq!(d.user_principal_name, UNKNOWN_USER);
        assert_eq!(d.platform, OsFamily::Other);
    }

    #[test]
    fn summary_lumps_unknown_into_noncompliant() {
        let mut summary = ComplianceSummary::default();
        summary.record("a", ComplianceState::Compliant);
        summary.record("a", ComplianceState::Compliant);
        summary.record("a", ComplianceState::Unknown);
        summary.record("b", ComplianceState::Noncompliant);

        assert_eq!(
            summary.get("a"),
            Some(&UserCompliance {
                compliant: 2,
                noncompliant: 1
            })
        );
        assert_eq!(summary.get("b").map(|c| c.noncompliant), Some(1));
        assert_eq!(summary.len(), 2);
    }

    #[test]
    fn compliance_state_is_exact_match() {
        assert_eq!(
            ComplianceState::from_raw(Some("Compliant")),
            ComplianceState::Unknown
        );
        assert_eq!(
            ComplianceState::from_raw(Some("inGracePeriod")),
            ComplianceState::Unknown
        );
        assert_eq!(ComplianceState::from_raw(None), ComplianceState::Unknown);
    }
}
