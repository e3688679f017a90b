//! Hardware sufficiency policy.
//!
//! Only platforms with configured thresholds are evaluated; every other
//! platform is reported as `OK`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{Device, HardwareAlert, OsFamily};

const GB: f64 = 1e9;

/// Minimum hardware for one platform, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_ram_bytes: u64,
    pub min_storage_bytes: u64,
}

pub type ThresholdMap = BTreeMap<OsFamily, Thresholds>;

pub fn default_thresholds() -> ThresholdMap {
    BTreeMap::from([(
        OsFamily::Windows,
        Thresholds {
            min_ram_bytes: 8_000_000_000,
            min_storage_bytes: 256_000_000_000,
        },
    )])
}

pub fn evaluate(device: &Device, thresholds: &ThresholdMap) -> HardwareAlert {
    let Some(limits) = thresholds.get(&device.platform) else {
        return HardwareAlert::ok();
    };

    let mut fragments = Vec::new();

    let ram_insufficient = match device.physical_memory_in_bytes {
        Some(ram) if ram < limits.min_ram_bytes => {
            fragments.push(format!("RAM insuficiente ({:.1}GB)", ram as f64 / GB));
            true
        }
        _ => false,
    };

    let storage = device.total_storage_space_in_bytes;
    let storage_insufficient = storage < limits.min_storage_bytes;
    if storage_insufficient {
        fragments.push(format!(
            "Almacenamiento insuficiente ({:.1}GB)",
            storage as f64 / GB
        ));
    }

    if fragments.is_empty() {
        return HardwareAlert::ok();
    }

    HardwareAlert {
        ram_insufficient,
        storage_insufficient,
        text: fragments.join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ComplianceState, UNKNOWN_USER};

    fn device(platform: OsFamily, ram: Option<u64>, storage: u64) -> Device {
        Device {
            id: "d".into(),
            user_principal_name: UNKNOWN_USER.into(),
            device_name: None,
            operating_system: format!("{:?}", platform),
            platform,
            compliance_state: ComplianceState::Compliant,
            total_storage_space_in_bytes: storage,
            free_storage_space_in_bytes: 0,
            physical_memory_in_bytes: ram,
        }
    }

    #[test]
    fn low_ram_windows_device() {
        let alert = evaluate(
            &device(OsFamily::Windows, Some(4_000_000_000), 500_000_000_000),
            &default_thresholds(),
        );
        assert!(alert.ram_insufficient);
        assert!(!alert.storage_insufficient);
        assert_eq!(alert.text, "RAM insuficiente (4.0GB)");
    }

    #[test]
    fn both_dimensions_failing() {
        let alert = evaluate(
            &device(OsFamily::Windows, Some(2_500_000_000), 128_000_000_000),
            &default_thresholds(),
        );
        assert!(alert.ram_insufficient && alert.storage_insufficient);
        assert_eq!(
            alert.text,
            "RAM insuficiente (2.5GB) Almacenamiento insuficiente (128.0GB)"
        );
    }

    #[test]
    fn thresholds_are_strict_lower_bounds() {
        let alert = evaluate(
            &device(OsFamily::Windows, Some(8_000_000_000), 256_000_000_000),
            &default_thresholds(),
        );
        assert_eq!(alert, HardwareAlert::ok());
    }

    #[test]
    fn other_platforms_are_always_ok() {
        for platform in [OsFamily::Ios, OsFamily::Other] {
            let alert = evaluate(&device(platform, Some(1), 1), &default_thresholds());
            assert_eq!(alert.text, "OK");
            assert!(alert.is_ok());
        }
    }

    #[test]
    fn unknown_memory_only_checks_storage() {
        let mut thresholds = default_thresholds();
        thresholds.insert(
            OsFamily::Ios,
            Thresholds {
                min_ram_bytes: 4_000_000_000,
                min_storage_bytes: 64_000_000_000,
            },
        );
        let alert = evaluate(&device(OsFamily::Ios, None, 32_000_000_000), &thresholds);
        assert!(!alert.ram_insufficient);
        assert!(alert.storage_insufficient);
    }
}
