//! `mdm-report config` — print the effective configuration.

use anyhow::Result;

use crate::config::Config;

pub fn show(cfg: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
    Ok(())
}
