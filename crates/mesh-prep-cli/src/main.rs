//! mesh-prep-cli: Command-line interface for the mesh preparation pipeline.
//!
//! Wraps the mesh-prep library for scripting and batch use: run the full
//! smooth/repair pipeline, inspect a mesh, or check its print-readiness.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_prep=info` - Basic stage logging
//! - `RUST_LOG=mesh_prep=debug` - Detailed progress and timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Smooth and repair a scan with default settings
//! RUST_LOG=mesh_prep=info mesh-prep process scan.obj -o printable.obj
//!
//! # Aggressive smoothing plus bump removal
//! mesh-prep process scan.ply -o out.ply --iterations 10 --remove-bumps
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{check, info, process};

/// mesh-prep - Prepare triangulated meshes for 3D printing.
///
/// Smooth scan noise, optionally remove bumps via surface reconstruction,
/// and repair the result into a printable mesh.
#[derive(Parser)]
#[command(name = "mesh-prep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full preparation pipeline on a mesh
    Process {
        /// Input mesh file (OBJ or PLY)
        input: PathBuf,

        /// Output file path (format determined by extension)
        #[arg(short, long)]
        output: PathBuf,

        /// Taubin smoothing iterations (0 disables smoothing)
        #[arg(long, default_value = "5")]
        iterations: usize,

        /// Taubin shrink coefficient
        #[arg(long, default_value = "0.5")]
        lambda: f64,

        /// Taubin inflate coefficient (must be more negative than -lambda)
        #[arg(long, default_value = "-0.53", allow_hyphen_values = true)]
        mu: f64,

        /// Remove bumps by resampling and reconstructing the surface
        #[arg(long)]
        remove_bumps: bool,

        /// Reconstruction voxel size
        #[arg(long, default_value = "0.01")]
        voxel_size: f64,

        /// Neighbor count for statistical outlier removal
        #[arg(long, default_value = "20")]
        neighbors: usize,

        /// Standard-deviation ratio for the outlier threshold
        #[arg(long, default_value = "2.0")]
        std_ratio: f64,
    },

    /// Display mesh statistics and information
    Info {
        /// Input mesh file
        input: PathBuf,

        /// Show volume and surface area as well
        #[arg(long)]
        detailed: bool,
    },

    /// Check a mesh for printability without modifying it
    Check {
        /// Input mesh file
        input: PathBuf,

        /// Exit non-zero when the mesh is not print-ready
        #[arg(long)]
        strict: bool,
    },
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG takes precedence over -v flags.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_prep=info",
            2 => "mesh_prep=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    // Nicer panic reports in development builds
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Process {
            input,
            output,
            iterations,
            lambda,
            mu,
            remove_bumps,
            voxel_size,
            neighbors,
            std_ratio,
        } => process::run(
            input,
            output,
            process::ProcessArgs {
                iterations: *iterations,
                lambda: *lambda,
                mu: *mu,
                remove_bumps: *remove_bumps,
                voxel_size: *voxel_size,
                neighbors: *neighbors,
                std_ratio: *std_ratio,
            },
            &cli,
        ),
        Commands::Info { input, detailed } => info::run(input, *detailed, &cli),
        Commands::Check { input, strict } => check::run(input, *strict, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(prep_err) = e.downcast_ref::<mesh_prep::PrepError>() {
                eprintln!("{}: {}", "Error".red().bold(), prep_err);
                eprintln!("  {}: {}", "Code".cyan(), prep_err.code_str());
                if let Some(help) = miette::Diagnostic::help(prep_err) {
                    eprintln!("  {}: {}", "Suggestion".green(), help);
                }
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
