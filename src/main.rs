mod auth;
mod client;
mod commands;
mod config;
mod domain;
mod error;
mod report;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::run::Delivery;
use crate::report::console::OutputFormat;

#[derive(Parser)]
#[command(
    name = "mdm-report",
    version,
    about = "Device inventory and compliance reporter for Intune-managed fleets"
)]
struct Cli {
    /// Path to config file (default: ~/.config/mdm-report/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides config; RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one aggregation and print the report
    Run {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Don't print the report to stdout
        #[arg(long)]
        quiet: bool,

        /// Write the report as JSON into report.output_dir
        #[arg(long)]
        save: bool,

        /// Mail the report through Graph sendMail
        #[arg(long)]
        send: bool,
    },

    /// Re-run the aggregation on a fixed interval
    Daemon {
        /// Seconds between runs (overrides schedule.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Print the effective configuration (secrets redacted)
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        cfg.log_level = level;
    }

    match cli.command {
        Commands::Run {
            format,
            quiet,
            save,
            send,
        } => {
            telemetry::init(&cfg.log_level, cfg.log_json);
            let delivery = Delivery {
                console: (!quiet).then_some(format),
                save,
                send,
            };
            commands::run::run(cfg, delivery)
        }
        Commands::Daemon { interval_secs } => {
            telemetry::init(&cfg.log_level, cfg.log_json);
            commands::daemon::run(cfg, interval_secs)
        }
        Commands::Config => commands::config::show(&cfg),
    }
}
