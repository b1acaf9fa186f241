#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for spatial subset-join jobs.
//!
//! Uses `indicatif-log-bridge` (via [`geocomp_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod job;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geocomp_cli_utils::IndicatifProgress;
use geocomp_crs::{BuiltinReprojector, ProjectionError};
use geocomp_io::{FormatRegistry, IoError, ReadOptions};
use geocomp_workflow::WorkflowError;
use thiserror::Error;

/// Errors that stop a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job file could not be read.
    #[error("Failed to read job file: {0}")]
    Io(#[from] std::io::Error),

    /// The job file is not a valid job definition.
    #[error("Invalid job definition: {0}")]
    Parse(#[from] toml::de::Error),

    /// Reading or writing data failed.
    #[error(transparent)]
    Data(#[from] IoError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The region source has no feature with the requested identifier.
    #[error("No feature '{feature}' in {path}")]
    FeatureNotFound {
        /// Requested identifier.
        feature: String,
        /// Source file.
        path: String,
    },

    /// The join delimiter is not a single ASCII character.
    #[error("Invalid delimiter '{delimiter}': must be a single ASCII character")]
    InvalidDelimiter {
        /// The rejected delimiter.
        delimiter: char,
    },
}

#[derive(Parser)]
#[command(name = "geocomp", about = "Spatial subset-join jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a TOML job definition
    Run {
        /// Path to the job file
        job: PathBuf,
    },
    /// Describe a vector file: feature count, CRS and schema
    Info {
        /// Path to the vector file
        path: PathBuf,
        /// Property holding feature identifiers when features lack an `id`
        #[arg(long)]
        id_field: Option<String>,
    },
    /// List supported vector formats
    Formats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = geocomp_cli_utils::init_logger();
    let cli = Cli::parse();
    let registry = FormatRegistry::default();

    match cli.command {
        Commands::Run { job } => {
            let definition = job::load_job(&job)?;
            let progress = IndicatifProgress::steps_bar(
                &multi,
                "Running job",
                pipeline::step_count(&definition),
            );

            let summary =
                pipeline::run_job(&definition, &registry, &BuiltinReprojector, progress.as_ref())?;

            progress.finish(format!(
                "Wrote {} of {} features to {}",
                summary.written,
                summary.read,
                summary.output.display()
            ));
        }
        Commands::Info { path, id_field } => {
            let collection = registry.read(&path, &ReadOptions { id_field })?;

            println!("{}", path.display());
            println!("  features:    {}", collection.len());
            println!("  crs:         {}", collection.crs());
            println!("  unique ids:  {}", collection.has_unique_ids());
            println!("  single-part: {}", collection.is_single_part());
            println!("  columns:");
            for column in collection.schema().columns() {
                println!("    {:<24} {}", column.name, column.column_type);
            }
        }
        Commands::Formats => {
            println!("{:<12} EXTENSIONS", "FORMAT");
            println!("{}", "-".repeat(40));
            for format in registry.formats() {
                let extensions = registry.driver(format)?.extensions().join(", ");
                println!("{:<12} {extensions}", format.as_ref());
            }
        }
    }

    Ok(())
}
