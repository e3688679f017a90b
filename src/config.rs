//! Layered configuration: defaults → YAML file → `MDM_REPORT_*` environment.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::hardware::{default_thresholds, ThresholdMap};

pub const ENV_PREFIX: &str = "MDM_REPORT_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub enrichment: EnrichmentConfig,
    pub policy: PolicyConfig,
    pub report: ReportConfig,
    pub mail: MailConfig,
    pub schedule: ScheduleConfig,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            enrichment: EnrichmentConfig::default(),
            policy: PolicyConfig::default(),
            report: ReportConfig::default(),
            mail: MailConfig::default(),
            schedule: ScheduleConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub login_url: String,
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            base_url: "https://graph.microsoft.com/beta".to_string(),
            login_url: "https://login.microsoftonline.com".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Devices enriched in parallel.
    pub concurrency: usize,
    /// Attempts per app-inventory request before giving up on 429.
    pub max_attempts: u32,
    /// Backoff when a 429 carries no `Retry-After`.
    pub default_retry_after_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            default_retry_after_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow_list: Vec<String>,
    pub thresholds: ThresholdMap,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            thresholds: default_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub filename: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./temp"),
            filename: "managed_devices_report".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,
    /// Mailbox the report is sent from via Graph `sendMail`.
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub base_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender: String::new(),
            recipients: Vec::new(),
            subject: "Reporte de Dispositivos Gestionados".to_string(),
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
        }
    }
}

impl MailConfig {
    /// Sender and recipients are needed before anything can be mailed.
    pub fn check(&self) -> Result<()> {
        if self.sender.trim().is_empty() {
            bail!("mail.sender is required to send the report");
        }
        if self.recipients.is_empty() {
            bail!("mail.recipients is empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 4 * 60 * 60,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("mdm-report").join("config.yaml"))
    }

    /// Fail early when app-registration credentials are missing.
    pub fn require_credentials(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("graph.tenant_id", &self.graph.tenant_id),
            ("graph.client_id", &self.graph.client_id),
            ("graph.client_secret", &self.graph.client_secret),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if !missing.is_empty() {
            bail!(
                "missing Graph credentials: {} (set them in the config file or via {}GRAPH__*)",
                missing.join(", "),
                ENV_PREFIX
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.enrichment.concurrency == 0 {
            bail!("enrichment.concurrency must be at least 1");
        }
        if self.enrichment.max_attempts == 0 {
            bail!("enrichment.max_attempts must be at least 1");
        }
        if self.mail.enabled {
            self.mail.check()?;
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if !cfg.graph.client_secret.is_empty() {
            cfg.graph.client_secret = "********".to_string();
        }
        cfg
    }
}

/// Load configuration. An explicit `path` must exist; the default path is
/// optional.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new();

    match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} not found", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        None => {
            if let Ok(default) = Config::default_path() {
                if default.exists() {
                    figment = figment.merge(Yaml::file(default));
                }
            }
        }
    }

    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("parsing configuration")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OsFamily;

    #[test]
    fn defaults_match_reference_policy() {
        let cfg = Config::default();
        let windows = cfg.policy.thresholds[&OsFamily::Windows];
        assert_eq!(windows.min_ram_bytes, 8_000_000_000);
        assert_eq!(windows.min_storage_bytes, 256_000_000_000);
        assert_eq!(cfg.enrichment.max_attempts, 3);
        assert_eq!(cfg.enrichment.default_retry_after_secs, 10);
        assert_eq!(cfg.schedule.interval_secs, 14_400);
    }

    #[test]
    fn file_and_env_layers_merge() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
graph:
  tenant_id: contoso
  client_id: app-id
enrichment:
  concurrency: 8
policy:
  allow_list: ["Company Portal", "Microsoft Authenticator"]
  thresholds:
    windows:
      min_ram_bytes: 16000000000
      min_storage_bytes: 512000000000
"#,
            )?;
            jail.set_env("MDM_REPORT_GRAPH__CLIENT_SECRET", "s3cret");
            jail.set_env("MDM_REPORT_LOG_LEVEL", "debug");

            let cfg = load(Some(Path::new("config.yaml"))).map_err(|e| e.to_string())?;

            assert_eq!(cfg.graph.tenant_id, "contoso");
            assert_eq!(cfg.graph.client_secret, "s3cret");
            assert_eq!(cfg.graph.base_url, "https://graph.microsoft.com/beta");
            assert_eq!(cfg.enrichment.concurrency, 8);
            assert_eq!(cfg.enrichment.max_attempts, 3);
            assert_eq!(cfg.policy.allow_list.len(), 2);
            assert_eq!(
                cfg.policy.thresholds[&OsFamily::Windows].min_ram_bytes,
                16_000_000_000
            );
            assert_eq!(cfg.log_level, "debug");
            assert!(cfg.require_credentials().is_ok());
            assert_eq!(cfg.redacted().graph.client_secret, "********");
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        figment::Jail::expect_with(|_jail| {
            assert!(load(Some(Path::new("nope.yaml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_credentials_are_named() {
        let mut cfg = Config::default();
        cfg.graph.tenant_id = "contoso".into();
        let err = cfg.require_credentials().unwrap_err().to_string();
        assert!(err.contains("graph.client_id"));
        assert!(err.contains("graph.client_secret"));
        assert!(!err.contains("graph.tenant_id"));
    }

    #[test]
    fn enabled_mail_needs_recipients() {
        let mut cfg = Config::default();
        cfg.mail.enabled = true;
        cfg.mail.sender = "reports@contoso.com".into();
        assert!(cfg.validate().is_err());
        cfg.mail.recipients.push("it@contoso.com".into());
        assert!(cfg.validate().is_ok());
    }
}
