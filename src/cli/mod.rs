//! CLI Module
//!
//! Command-line interface for running and verifying ROI Align fixtures.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::tensor::Shape;

/// Log filter used when neither `RUST_LOG` nor `-v` is given
pub const DEFAULT_LOG_FILTER: &str = "info";

/// RoiAlign - ROI Align pooling kernel runner
#[derive(Parser, Debug)]
#[command(name = "roialign")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a fixture and print the pooled output
    #[command(name = "run")]
    Run {
        /// Path to the fixture JSON
        fixture: PathBuf,

        /// Write the output tensor here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify fixtures against their expected outputs
    #[command(name = "verify")]
    Verify {
        /// Fixture JSON files
        #[arg(required = true)]
        fixtures: Vec<PathBuf>,
    },

    /// Print the output shape for the given input and ROI shapes
    #[command(name = "shape")]
    Shape {
        /// Input shape, e.g. 1,4,4,1
        #[arg(long)]
        input: Shape,

        /// ROI shape, e.g. 2,5
        #[arg(long)]
        rois: Shape,

        /// Pooled grid height
        #[arg(long)]
        out_height: u32,

        /// Pooled grid width
        #[arg(long)]
        out_width: u32,
    },
}

/// Pick the log filter: `RUST_LOG` wins, then `-v` count, then the default
pub fn log_filter(verbose: u8, rust_log_env: Option<&str>) -> String {
    if let Some(filter) = rust_log_env.map(str::trim).filter(|f| !f.is_empty()) {
        return filter.to_string();
    }
    match verbose {
        0 => DEFAULT_LOG_FILTER.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global tracing subscriber writing to stderr
pub fn init_logging(verbose: u8) {
    let env = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(log_filter(verbose, env.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_precedence() {
        assert_eq!(log_filter(0, None), "info");
        assert_eq!(log_filter(1, None), "debug");
        assert_eq!(log_filter(3, None), "trace");
        assert_eq!(log_filter(2, Some("roialign=warn")), "roialign=warn");
        assert_eq!(log_filter(1, Some("  ")), "debug");
    }

    #[test]
    fn test_parse_shape_command() {
        let cli = Cli::try_parse_from([
            "roialign",
            "shape",
            "--input",
            "2,8,8,3",
            "--rois",
            "4,5",
            "--out-height",
            "2",
            "--out-width",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Shape {
                input,
                rois,
                out_height,
                out_width,
            } => {
                assert_eq!(input, Shape::from([2, 8, 8, 3]));
                assert_eq!(rois, Shape::from([4, 5]));
                assert_eq!((out_height, out_width), (2, 3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_verbose_count() {
        let cli = Cli::try_parse_from(["roialign", "-vv", "verify", "a.json", "b.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Verify { ref fixtures } if fixtures.len() == 2));
    }
}
