//! Drift Playground
//!
//! Offline harness for pricing configurations:
//! - check: load a configuration and print it back as normalized TOML
//! - run: replay a scripted scenario of trades and ticks

mod logging;
mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use item_registry::ItemRegistry;
use price_tracker::{PriceCalculator, PricingConfig};
use std::path::PathBuf;
use tracing::info;

use crate::logging::{initialize_logging, LogFormat};
use crate::scenario::{Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(name = "drift-playground")]
#[command(about = "Try pricing configurations against scripted trades")]
#[command(version = "0.1.0")]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print its normalized form
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Replay a scenario file against a configuration
    Run {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        scenario: PathBuf,

        /// Chart height in rows
        #[arg(long, default_value = "4")]
        chart_lines: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Check { config } => check(config),
        Commands::Run { config, scenario, chart_lines } => run(config, scenario, chart_lines),
    }
}

fn check(path: PathBuf) -> Result<()> {
    let config = PricingConfig::from_file(&path).with_context(|| format!("loading {}", path.display()))?;
    let mut registry = ItemRegistry::new();
    let calculator = PriceCalculator::from_config(&config, &mut registry)?;
    info!("Configuration {} is valid", path.display());

    let normalized = calculator.to_configuration(&registry).to_toml_string()?;
    println!("{}", "✓ configuration is valid".green().bold());
    println!("{normalized}");
    Ok(())
}

fn run(config_path: PathBuf, scenario_path: PathBuf, chart_lines: usize) -> Result<()> {
    let config =
        PricingConfig::from_file(&config_path).with_context(|| format!("loading {}", config_path.display()))?;
    let scenario = Scenario::from_file(&scenario_path)?;
    info!("Running {} steps from {}", scenario.steps.len(), scenario_path.display());

    println!("{}", format!("🎮 {}", scenario_path.display()).bold());
    let mut runner = ScenarioRunner::new(&config, scenario.start, chart_lines)?;
    runner.run(&scenario)?;
    println!("{}", "✓ scenario complete".green().bold());
    Ok(())
}
