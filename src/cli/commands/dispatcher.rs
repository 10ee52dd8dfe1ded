//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use async_trait::async_trait;

use crate::cli::args::{Cli, Commands};
use crate::error::Result;

use super::display::OutputMode;

/// Exit code for a job that did not succeed.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for usage and job file errors.
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
#[async_trait]
pub trait Command {
    /// Execute the command.
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    async fn execute(&self, mode: OutputMode) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: u8,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: u8) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
#[derive(Debug, Default)]
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch and execute a command.
    pub async fn dispatch(&self, cli: &Cli) -> Result<CommandResult> {
        let mode = OutputMode::from_flags(cli.verbose, cli.quiet);
        match &cli.command {
            Commands::Run(args) => super::run::RunCommand::new(args.clone()).execute(mode).await,
            Commands::Validate(args) => {
                super::validate::ValidateCommand::new(args.clone())
                    .execute(mode)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(EXIT_CONFIG_ERROR);
        assert!(!result.success);
        assert_eq!(result.exit_code, 2);
    }
}
