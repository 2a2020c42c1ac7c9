//! RoiAlign CLI
//!
//! Command-line interface for running and verifying ROI Align fixtures.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use roialign::cli::{self, commands, Cli, Commands};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    debug!("RoiAlign v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { fixture, output } => {
            commands::run(&fixture, output.as_deref())
                .with_context(|| format!("failed to run fixture {}", fixture.display()))?;
        }
        Commands::Verify { fixtures } => {
            if commands::verify(&fixtures) > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Shape {
            input,
            rois,
            out_height,
            out_width,
        } => {
            commands::shape(&input, &rois, out_height, out_width)
                .context("failed to infer output shape")?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
