//! Validate command implementation.
//!
//! The `stepworker validate` command checks a job file without running it.

use async_trait::async_trait;

use crate::cli::args::ValidateArgs;
use crate::config::{load_job_file, validate_job_errors};
use crate::error::Result;
use crate::steps::builtin::TaskRegistry;

use super::dispatcher::{Command, CommandResult, EXIT_CONFIG_ERROR};
use super::display::OutputMode;

/// The validate command implementation.
pub struct ValidateCommand {
    args: ValidateArgs,
    registry: TaskRegistry,
}

impl ValidateCommand {
    pub fn new(args: ValidateArgs) -> Self {
        Self {
            args,
            registry: TaskRegistry::with_builtins(),
        }
    }
}

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, mode: OutputMode) -> Result<CommandResult> {
        let definition = match load_job_file(&self.args.file) {
            Ok(definition) => definition,
            Err(err) => {
                eprintln!("Error: {}", err);
                return Ok(CommandResult::failure(EXIT_CONFIG_ERROR));
            }
        };

        let errors = validate_job_errors(&definition, &self.registry);
        if errors.is_empty() {
            if mode != OutputMode::Quiet {
                println!(
                    "{} is valid ({} step(s))",
                    self.args.file.display(),
                    definition.steps.len()
                );
            }
            return Ok(CommandResult::success());
        }

        for error in &errors {
            eprintln!("  [{}] {}", error.rule, error.message);
        }
        eprintln!("{} problem(s) found in {}", errors.len(), self.args.file.display());
        Ok(CommandResult::failure(EXIT_CONFIG_ERROR))
    }
}
