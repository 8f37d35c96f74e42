//! D-scan retrieval command-line interface.
//!
//! Run retrievals from TOML configuration files:
//! ```sh
//! dscan retrieve job.toml
//! dscan validate job.toml
//! dscan materials
//! ```

mod config;
mod loader;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dscan")]
#[command(about = "Dispersion-scan pulse retrieval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a retrieval from a TOML configuration file.
    Retrieve {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the retrieval.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Display information about supported dispersive elements.
    Materials,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Retrieve { config, output } => {
            let job = config::load_config(&config)?;
            println!("D-scan retrieval");
            println!("Configuration: {}", config.display());

            let summary = runner::run_retrieval(&job, output)?;

            match summary.optimal_fwhm_fs {
                Some(fwhm) => println!(
                    "Shortest: {:.1} fs @ {:.3} mm ({})",
                    fwhm,
                    summary.optimal_stage_position_mm,
                    if summary.converged {
                        "converged"
                    } else {
                        "iteration cap reached"
                    }
                ),
                None => println!(
                    "No defined duration at {:.3} mm",
                    summary.optimal_stage_position_mm
                ),
            }
            Ok(())
        }
        Commands::Validate { config } => {
            let _job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Materials => {
            println!("Supported dispersive elements:");
            println!();
            println!("  Sellmeier glasses (wedge insertion):");
            println!("    FS         — Fused silica, Malitson (1965), 0.21–6.7 µm");
            println!("    BK7        — SCHOTT N-BK7, 0.3–2.5 µm");
            println!();
            println!("  Grating compressors (pair separation, coefficient 4):");
            println!("    grating-a  — 600 mm⁻¹ at 15° incidence");
            println!("    grating-b  — 1200 mm⁻¹ at 30° incidence");
            Ok(())
        }
    }
}
