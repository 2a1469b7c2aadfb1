//! Strata CLI - inspection and simulation tool for the two-tranche
//! accounting engine
//!
//! Validates market configuration files, previews and explains
//! synchronizations, reports coverage sizing, and replays TOML
//! scenarios with per-step conservation verification.

use clap::{Parser, Subcommand};

mod config;
mod inspect;
mod report;
mod simulate;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata accounting engine CLI - inspect, size, and simulate two-tranche markets", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a market configuration file and show derived bounds
    CheckConfig {
        /// Path to the market TOML file
        file: String,
    },

    /// Preview a synchronization without committing anything
    Preview {
        /// Path to the market TOML file
        file: String,

        /// Observed senior raw NAV
        #[arg(long)]
        senior: String,

        /// Observed junior raw NAV
        #[arg(long)]
        junior: String,

        /// Observation timestamp (seconds)
        #[arg(long, default_value = "0")]
        at: u64,

        /// Emit JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Explain one waterfall run step by step
    Waterfall {
        /// Path to the market TOML file
        file: String,

        /// Observed senior raw NAV
        #[arg(long)]
        senior: String,

        /// Observed junior raw NAV
        #[arg(long)]
        junior: String,

        /// Observation timestamp (seconds)
        #[arg(long, default_value = "0")]
        at: u64,

        /// Emit JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Coverage utilization and tight deposit/withdrawal bounds
    Sizing {
        /// Path to the market TOML file
        file: String,

        /// Emit JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Replay a TOML scenario end to end
    Simulate {
        /// Path to the scenario TOML file
        file: String,

        /// Emit JSON instead of a report
        #[arg(long)]
        json: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { file } => {
            inspect::check_config(&file)?;
        }
        Commands::Preview {
            file,
            senior,
            junior,
            at,
            json,
        } => {
            inspect::preview(&file, &senior, &junior, at, json, cli.verbose)?;
        }
        Commands::Waterfall {
            file,
            senior,
            junior,
            at,
            json,
        } => {
            inspect::waterfall(&file, &senior, &junior, at, json)?;
        }
        Commands::Sizing { file, json } => {
            inspect::sizing(&file, json)?;
        }
        Commands::Simulate {
            file,
            json,
            no_progress,
        } => {
            let scenario = config::load_scenario_file(&file)?;
            let simulation = simulate::run(&scenario, !no_progress && !json)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&simulation)?);
            } else {
                simulate::print_report(&simulation);
            }
        }
    }

    Ok(())
}
