//! Run command implementation.
//!
//! The `stepworker run` command executes the steps of a job file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::args::RunArgs;
use crate::condition::StatusEvaluator;
use crate::config::{build_steps, build_variables, load_job_file, validate_job, JobOverrides};
use crate::context::JobContext;
use crate::error::{Result, WorkerError};
use crate::outcome::TaskResult;
use crate::runner::StepsRunner;
use crate::secrets::ValueMasker;
use crate::steps::builtin::TaskRegistry;

use super::dispatcher::{Command, CommandResult, EXIT_CONFIG_ERROR};
use super::display::{exit_code_for, job_line, step_line, OutputMode};
use super::report::JobReport;

/// The run command implementation.
pub struct RunCommand {
    args: RunArgs,
    registry: TaskRegistry,
}

impl RunCommand {
    /// Create a new run command with the built-in tasks.
    pub fn new(args: RunArgs) -> Self {
        Self::with_registry(args, TaskRegistry::with_builtins())
    }

    /// Create a run command resolving tasks from `registry`.
    pub fn with_registry(args: RunArgs, registry: TaskRegistry) -> Self {
        Self { args, registry }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn overrides(&self) -> JobOverrides {
        JobOverrides {
            variables: self.args.vars.clone(),
            secrets: self.args.secrets.clone(),
            working_directory: self
                .args
                .workdir
                .clone()
                .or_else(|| job_directory(&self.args.file)),
        }
    }

    /// Run the job with the given tokens and return its result.
    ///
    /// Job file problems come back as errors before any step starts.
    pub async fn run_job(
        &self,
        cancellation: CancellationToken,
        shutdown: CancellationToken,
        mode: OutputMode,
    ) -> Result<TaskResult> {
        let definition = load_job_file(&self.args.file)?;
        validate_job(&definition, &self.registry)?;

        let masker = Arc::new(ValueMasker::new());
        let (store, warnings) = build_variables(&definition, &self.overrides(), masker);
        for warning in &warnings {
            warn!("{}", warning);
        }

        let job = JobContext::with_tokens(Arc::new(store), cancellation, shutdown);
        let steps = build_steps(&definition, &job, &self.registry)?;
        let name = definition.name.clone().unwrap_or_else(|| job_file_stem(&self.args.file));

        info!("Running job '{}' with {} step(s)", name, steps.len());
        StepsRunner::new(Arc::new(StatusEvaluator::new()))
            .with_cancellation_hook(|| info!("Job cancellation requested"))
            .run(&job, &steps)
            .await?;

        let result = job.result().unwrap_or(TaskResult::Succeeded);
        if let Some(path) = &self.args.report {
            JobReport::new(&name, result, &steps).write_to(path)?;
            debug!("Wrote job report to {}", path.display());
        }
        if mode != OutputMode::Quiet {
            for ctx in steps.iter().filter_map(|step| step.context()) {
                println!("{}", step_line(ctx, mode));
            }
        }
        println!("{}", job_line(&name, result));
        Ok(result)
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, mode: OutputMode) -> Result<CommandResult> {
        let cancellation = CancellationToken::new();
        let shutdown = CancellationToken::new();
        let interrupts = watch_interrupts(cancellation.clone(), shutdown.clone());

        let outcome = self.run_job(cancellation, shutdown, mode).await;
        interrupts.abort();

        match outcome {
            Ok(result) => {
                debug!("Job result: {}", result);
                let code = exit_code_for(result);
                if code == 0 {
                    Ok(CommandResult::success())
                } else {
                    Ok(CommandResult::failure(code))
                }
            }
            Err(
                err @ (WorkerError::JobNotFound { .. }
                | WorkerError::JobParseError { .. }
                | WorkerError::JobValidationError { .. }),
            ) => {
                eprintln!("Error: {}", err);
                Ok(CommandResult::failure(EXIT_CONFIG_ERROR))
            }
            Err(err) => Err(err),
        }
    }
}

/// First interrupt cancels the job, the second signals shutdown.
fn watch_interrupts(cancellation: CancellationToken, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, canceling the job");
        cancellation.cancel();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Second interrupt received, shutting down");
        shutdown.cancel();
    })
}

fn job_directory(file: &Path) -> Option<PathBuf> {
    file.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

fn job_file_stem(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "job".to_string())
}
