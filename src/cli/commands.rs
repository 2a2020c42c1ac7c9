//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::fixture::OperatorFixture;
use crate::ops::{RoiAlign, RoiAlignParams};
use crate::tensor::Shape;

/// Run a fixture and print or write the output tensor as JSON.
pub fn run(fixture_path: &Path, output: Option<&Path>) -> Result<()> {
    info!("Running fixture: {}", fixture_path.display());

    let fixture = OperatorFixture::load(fixture_path)?;
    let result = fixture.run()?;
    let json = serde_json::to_string_pretty(&result)?;

    match output {
        Some(path) => {
            fs::write(path, json)?;
            println!("Output {} written to {}", result.shape(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Verify fixtures; returns the number that failed.
///
/// Fixtures that cannot be loaded or run count as failures.
pub fn verify(fixtures: &[PathBuf]) -> usize {
    let mut failed = 0;

    for path in fixtures {
        let outcome = OperatorFixture::load(path).and_then(|fixture| fixture.verify());
        match outcome {
            Ok(report) if report.passed() => {
                println!(
                    "PASS {} ({}) max diff {:.3e}",
                    report.name,
                    path.display(),
                    report.max_abs_diff
                );
            }
            Ok(report) => {
                failed += 1;
                println!(
                    "FAIL {} ({}) max diff {:.3e} > tolerance {:.3e}",
                    report.name,
                    path.display(),
                    report.max_abs_diff,
                    report.tolerance
                );
            }
            Err(e) => {
                failed += 1;
                warn!("{}: {}", path.display(), e);
                println!("ERROR {} [{}] {}", path.display(), e.error_code(), e);
            }
        }
    }

    println!("{:-<60}", "");
    println!("{} passed, {} failed", fixtures.len() - failed, failed);

    failed
}

/// Print the inferred output shape.
pub fn shape(input: &Shape, rois: &Shape, out_height: u32, out_width: u32) -> Result<()> {
    let op = RoiAlign::new(RoiAlignParams::new(out_height, out_width))?;
    let output = op.prepare(input, rois)?;
    println!("{}", output);
    Ok(())
}
