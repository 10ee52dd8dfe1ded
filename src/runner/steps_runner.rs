//! Sequential step execution.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::cancellation::{CancellationHook, CancellationObserver};
use crate::condition::{ConditionError, ConditionEvaluator};
use crate::context::{JobContext, StepContext};
use crate::error::{Result, StepError, WorkerError};
use crate::outcome::{self, TaskResult};
use crate::steps::Step;

/// Logged when a step is stopped by its own timeout.
pub const STEP_TIMED_OUT: &str = "The step exceeded its timeout and was canceled.";

/// Runs a job's steps in order and folds their results into the job.
///
/// Failures inside steps become step and job results. The only errors
/// [`run`](StepsRunner::run) returns are precondition violations, which are
/// checked before the first step starts.
///
/// # Example
///
/// ```no_run
/// use stepworker::condition::StatusEvaluator;
/// use stepworker::context::JobContext;
/// use stepworker::runner::StepsRunner;
/// use stepworker::secrets::ValueMasker;
/// use stepworker::steps::{ScriptStep, Step, StepKind};
/// use stepworker::variables::VariableStore;
/// use std::sync::Arc;
///
/// # async fn example() -> stepworker::Result<()> {
/// let job = JobContext::new(Arc::new(VariableStore::empty(Arc::new(ValueMasker::new()))));
/// let mut step = Step::new("Hello", StepKind::Script(ScriptStep::new("echo hello")));
/// step.initialize(job.create_step_context(&step.display_name));
///
/// StepsRunner::new(Arc::new(StatusEvaluator)).run(&job, &[step]).await?;
/// println!("{:?}", job.result());
/// # Ok(())
/// # }
/// ```
pub struct StepsRunner {
    evaluator: Arc<dyn ConditionEvaluator>,
    on_cancellation: Option<CancellationHook>,
}

impl StepsRunner {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self {
            evaluator,
            on_cancellation: None,
        }
    }

    /// Call `hook` when the job is cancelled while a step is active.
    pub fn with_cancellation_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancellation = Some(Arc::new(hook));
        self
    }

    /// Run `steps` against `job`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any step is disabled or has not been
    /// initialized with an execution context. No step runs in that case.
    pub async fn run(&self, job: &JobContext, steps: &[Step]) -> Result<()> {
        let contexts = steps
            .iter()
            .map(validate)
            .collect::<Result<Vec<_>>>()?;

        for (step, ctx) in steps.iter().zip(contexts) {
            info!(
                "Processing step: DisplayName='{}', ContinueOnError={}, Enabled={}",
                step.display_name, step.continue_on_error, step.enabled
            );
            self.process(job, step, &ctx).await;

            match ctx.result() {
                Some(result @ (TaskResult::SucceededWithIssues | TaskResult::Failed)) => {
                    debug!("Update job result with current step result '{}'.", result);
                    job.merge_result(result);
                }
                other => debug!(
                    "No need for updating job result with current step result '{:?}'.",
                    other
                ),
            }
            debug!("Current state: job state = '{:?}'", job.result());
        }
        Ok(())
    }

    async fn process(&self, job: &JobContext, step: &Step, ctx: &Arc<StepContext>) {
        ctx.start();

        for warning in ctx.variables().recalculate_expanded() {
            ctx.warning(&warning);
        }

        let observer = if !job.is_cancelled() {
            Some(CancellationObserver::register(
                job,
                ctx,
                &step.condition,
                &self.evaluator,
                self.on_cancellation.as_ref(),
            ))
        } else {
            if job.result() != Some(TaskResult::Canceled) {
                job.set_result(Some(TaskResult::Canceled));
            }
            None
        };

        match self.evaluate(job, step, ctx) {
            Ok(true) => run_step(job, step, ctx).await,
            Ok(false) => {
                info!("Skipping step due to condition evaluation.");
                ctx.complete(Some(TaskResult::Skipped));
            }
            Err(err) => {
                error!("Caught error from expression: {}", err);
                ctx.error(&err.to_string());
                ctx.complete(Some(TaskResult::Failed));
            }
        }

        drop(observer);
    }

    fn evaluate(
        &self,
        job: &JobContext,
        step: &Step,
        ctx: &StepContext,
    ) -> std::result::Result<bool, ConditionError> {
        ctx.debug(&format!(
            "Evaluating condition for step: '{}'",
            step.display_name
        ));
        if job.is_shutting_down() {
            ctx.debug("Skip evaluate condition on agent shutdown.");
            return Ok(false);
        }
        self.evaluator.evaluate(ctx, &step.condition, false)
    }
}

fn validate(step: &Step) -> Result<Arc<StepContext>> {
    if !step.enabled {
        return Err(WorkerError::invalid_argument(
            "step.enabled",
            format!("step '{}' is disabled", step.display_name),
        ));
    }
    step.context().map(Arc::clone).ok_or_else(|| {
        WorkerError::invalid_argument(
            "step.context",
            format!("step '{}' has no execution context", step.display_name),
        )
    })
}

/// Whether a cancellation came from the step timeout rather than the job.
fn is_timeout(job: &JobContext, ctx: &StepContext) -> bool {
    ctx.cancellation_token().is_cancelled() && !job.is_cancelled()
}

async fn run_step(job: &JobContext, step: &Step, ctx: &Arc<StepContext>) {
    info!("Starting the step.");
    ctx.section(&format!("Starting: {}", step.display_name));
    if let Some(container) = &step.container {
        ctx.debug(&format!("Step targets container '{}'.", container));
    }
    ctx.set_timeout(step.timeout);

    let token = ctx.cancellation_token().clone();
    let outcome = tokio::select! {
        biased;
        result = step.run() => result,
        _ = token.cancelled() => Err(StepError::Canceled),
    };

    match outcome {
        Ok(()) => {}
        Err(StepError::Canceled) if is_timeout(job, ctx) => {
            error!("Caught timeout from step '{}'", step.display_name);
            ctx.error(STEP_TIMED_OUT);
            ctx.set_result(Some(TaskResult::Failed));
        }
        Err(err @ StepError::Canceled) => {
            error!("Caught cancellation from step '{}'", step.display_name);
            ctx.error(&err.to_string());
            ctx.set_result(Some(TaskResult::Canceled));
        }
        Err(StepError::Failed(err)) => {
            error!("Caught error from step '{}': {:#}", step.display_name, err);
            ctx.error(&format!("{:#}", err));
            ctx.set_result(Some(TaskResult::Failed));
        }
    }

    drain_async_commands(job, ctx).await;

    if let Some(command_result) = ctx.command_result() {
        ctx.set_result(Some(outcome::merge(ctx.result(), command_result)));
    }

    if ctx.result() == Some(TaskResult::Failed) && step.continue_on_error {
        ctx.set_result(Some(TaskResult::SucceededWithIssues));
        info!("Updated step result: {:?}", ctx.result());
    } else {
        info!("Step result: {:?}", ctx.result());
    }

    ctx.section(&format!("Finishing: {}", step.display_name));
    ctx.complete(None);
}

/// Await every async command in attachment order. A failing command does
/// not stop the rest from being awaited.
///
/// Commands run to completion even after a timeout; one that observes the
/// step token and reports cancellation is classified like the step body.
async fn drain_async_commands(job: &JobContext, ctx: &StepContext) {
    loop {
        let commands = ctx.take_async_commands();
        if commands.is_empty() {
            break;
        }

        for command in commands {
            let name = command.name().to_string();
            match command.wait().await {
                Ok(()) => debug!("Async command '{}' completed", name),
                Err(StepError::Canceled) if is_timeout(job, ctx) => {
                    error!("Caught timeout from async command '{}'", name);
                    ctx.error(STEP_TIMED_OUT);
                    ctx.merge_command_result(TaskResult::Failed);
                }
                Err(err @ StepError::Canceled) => {
                    error!("Caught cancellation from async command '{}'", name);
                    ctx.error(&err.to_string());
                    ctx.merge_command_result(TaskResult::Canceled);
                }
                Err(StepError::Failed(err)) => {
                    error!("Caught error from async command '{}': {:#}", name, err);
                    ctx.error(&format!("{:#}", err));
                    ctx.merge_command_result(TaskResult::Failed);
                }
            }
        }
    }
}
