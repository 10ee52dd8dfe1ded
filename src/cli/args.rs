//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stepworker - Run build job steps locally.
#[derive(Debug, Parser)]
#[command(name = "stepworker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the steps of a job file
    Run(RunArgs),

    /// Check a job file without running it
    Validate(ValidateArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Job definition file (YAML)
    pub file: PathBuf,

    /// Set a job variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub vars: Vec<(String, String)>,

    /// Set a secret job variable (repeatable)
    #[arg(long = "secret", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub secrets: Vec<(String, String)>,

    /// Default working directory for steps
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Write a JSON report of the run to FILE
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Arguments for the `validate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ValidateArgs {
    /// Job definition file (YAML)
    pub file: PathBuf,
}

/// Parse a `NAME=VALUE` pair. The value may be empty or contain `=`.
pub fn parse_assignment(input: &str) -> Result<(String, String), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", input))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("variable name is empty in '{}'", input));
    }
    Ok((name.to_string(), value.to_string()))
}
