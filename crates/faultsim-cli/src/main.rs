//! faultsim CLI - inspect fault-simulation coverage reports

mod summary;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use faultsim_core::{CoverageReport, SimulatorConfig, enabled_faults};

#[derive(Parser)]
#[command(name = "faultsim")]
#[command(about = "Response fault-injection coverage for API integration tests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a coverage report; exits 1 when gaps remain
    Summary {
        /// Report file (default: from config, fault_simulation_report.json)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Print the raw report JSON
    Show {
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Write an example config to .faultsim.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Check that config parses and the report path is usable
    Doctor {
        /// Config file (default: .faultsim.toml / .faultsim.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { report } => {
            let path = report_path(report)?;
            let tree = CoverageReport::load(&path)
                .with_context(|| format!("cannot load report {}", path.display()))?;
            print!("{}", summary::render(&tree));

            let gaps = summary::summarize(&tree).not_detected();
            Ok(if gaps > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            })
        }

        Commands::Show { report } => {
            let path = report_path(report)?;
            let tree = CoverageReport::load(&path)
                .with_context(|| format!("cannot load report {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Init { force } => {
            let path = Path::new(".faultsim.toml");
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(path, SimulatorConfig::example())
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Doctor { config } => doctor(config),
    }
}

/// Explicit path, or the configured default.
fn report_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let config = SimulatorConfig::load_default().context("cannot load config")?;
    Ok(config.report.output_path)
}

fn doctor(config_path: Option<PathBuf>) -> Result<ExitCode> {
    let config = match config_path {
        Some(path) => SimulatorConfig::load(&path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => SimulatorConfig::load_default().context("cannot load config")?,
    };
    println!("config: ok");

    let enabled = enabled_faults(&config);
    if enabled.is_empty() {
        println!("faults:  none enabled - the matrix will be empty");
    } else {
        let names: Vec<_> = enabled.iter().map(|k| k.name()).collect();
        println!("faults:  {}", names.join(", "));
    }

    let output = &config.report.output_path;
    let parent = output.parent().filter(|p| !p.as_os_str().is_empty());
    let mut healthy = true;
    if let Some(parent) = parent {
        if !parent.exists() {
            println!("report:  {} - parent directory missing", output.display());
            healthy = false;
        }
    }
    if healthy {
        println!("report:  {}", output.display());
    }

    println!(
        "exclusions: {} tests, {} endpoints",
        config.tests.exclude.len(),
        config.endpoints.exclude.len()
    );

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
