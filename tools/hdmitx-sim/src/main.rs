//! Host-side replay of display pipeline scenarios against the HDMI Tx driver.
//!
//! Usage:
//!   hdmitx-sim run <scenario.toml>    - Replay a scenario and check its expectations
//!   hdmitx-sim check <scenario.toml>  - Parse a scenario without replaying it
//!   hdmitx-sim modes                  - Show the built-in mode presets and their timing
//!
//! Log verbosity follows `RUST_LOG` (default `info`); `--verbose` forces `debug`.

mod replay;
mod scenario;
mod sim;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::replay::{Replayer, Report};
use crate::scenario::{Action, PRESETS, Scenario};

#[derive(Parser)]
#[command(name = "hdmitx-sim")]
#[command(about = "Replay display pipeline scenarios against the HDMI Tx driver")]
struct Cli {
    /// Log driver internals at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario and check its expectations
    Run {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },

    /// Parse a scenario without replaying it
    Check {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },

    /// Show the built-in mode presets and their device timing
    Modes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { scenario: path } => {
            let scenario = Scenario::load(&path)?;
            let mut replayer = Replayer::new(&scenario)?;
            let report = replayer.run(&scenario.steps)?;
            print_report(scenario.name.as_deref().unwrap_or("scenario"), &report);
            if !report.passed() {
                bail!(
                    "{} of {} steps did not meet expectations",
                    report.failures(),
                    report.steps.len()
                );
            }
        }

        Commands::Check { scenario: path } => {
            let scenario = Scenario::load(&path)?;
            for step in &scenario.steps {
                if let Action::ModeSet { mode } = &step.action {
                    mode.resolve()?;
                }
            }
            println!(
                "{}: {} nodes, {} steps",
                path.display(),
                scenario.topology.nodes.len(),
                scenario.steps.len()
            );
        }

        Commands::Modes => {
            for (name, mode) in PRESETS {
                match hdmitx::DeviceTiming::try_from(*mode) {
                    Ok(timing) => println!("{name:>8}  {mode}\n          {timing}"),
                    Err(err) => println!("{name:>8}  {mode}  ({err})"),
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_report(name: &str, report: &Report) {
    println!("{name}");
    for (index, step) in report.steps.iter().enumerate() {
        let status = match step.outcome {
            Ok(()) => "ok".to_string(),
            Err(errno) => errno.to_string(),
        };
        let mark = if step.failure.is_some() { "FAIL" } else { "pass" };
        println!(
            "{:>3}  {:<12} {:<22} {:<9} {}",
            index + 1,
            step.action,
            status,
            step.state.name(),
            mark
        );
        if let Some(failure) = &step.failure {
            println!("       {failure} (expected {})", step.expected);
        }
    }
}
