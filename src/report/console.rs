use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;

use crate::domain::types::{ComplianceState, FleetReport};

use super::{app_names, fmt_bytes, ReportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

pub struct ConsoleSink {
    format: OutputFormat,
}

impl ConsoleSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl ReportSink for ConsoleSink {
    async fn deliver(&self, report: &FleetReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Table => print_table(report),
        }
        Ok(())
    }
}

fn print_table(report: &FleetReport) {
    println!("{}", "═══ Managed Devices Report ═══".cyan().bold());
    println!("  Generated:     {}", report.generated_at.to_rfc3339());
    println!("  Devices:       {}", report.devices.len());
    println!();

    // ── Compliance ──
    println!("{}", "── Compliance Summary ──".yellow());
    println!(
        "  {:<40} {:>10} {:>13}",
        "UserPrincipalName".dimmed(),
        "Compliant".dimmed(),
        "Noncompliant".dimmed()
    );
    for (user, counts) in report.summary.iter() {
        let noncompliant = if counts.noncompliant > 0 {
            format!("{:>13}", counts.noncompliant).red().to_string()
        } else {
            format!("{:>13}", counts.noncompliant)
        };
        println!("  {:<40} {:>10} {}", user, counts.compliant, noncompliant);
    }

    // ── Devices ──
    println!();
    println!("{}", "── Device Details ──".yellow());
    for record in &report.devices {
        let d = &record.device;
        let state = match d.compliance_state {
            ComplianceState::Compliant => d.compliance_state.as_str().green(),
            ComplianceState::Noncompliant => d.compliance_state.as_str().red(),
            ComplianceState::Unknown => d.compliance_state.as_str().dimmed(),
        };
        let alert = if record.hardware_alert.is_ok() {
            record.hardware_alert.text.normal()
        } else {
            record.hardware_alert.text.yellow()
        };

        println!(
            "  {} ({})",
            d.device_name.as_deref().unwrap_or(&d.id).bold(),
            d.id.dimmed()
        );
        println!("    User:          {}", d.user_principal_name);
        println!("    OS:            {}", d.operating_system);
        println!("    Compliance:    {}", state);
        println!(
            "    Storage:       {} free of {}",
            fmt_bytes(Some(d.free_storage_space_in_bytes)),
            fmt_bytes(Some(d.total_storage_space_in_bytes))
        );
        println!("    Memory:        {}", fmt_bytes(d.physical_memory_in_bytes));
        println!("    Hardware:      {}", alert);
        println!("    Apps:          {}", app_names(report, &d.id));
    }

    if !report.failures.is_empty() {
        println!();
        println!("{}", "── Enrichment Failures ──".yellow());
        for f in &report.failures {
            println!(
                "  {} {} [{:?}] {}",
                "!!".red().bold(),
                f.device_id,
                f.stage,
                f.message.dimmed()
            );
        }
    }
    println!();
}
