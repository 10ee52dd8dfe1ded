//! Reaction to job cancellation while a step is active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, trace};

use crate::condition::{Condition, ConditionEvaluator};
use crate::context::{JobContext, StepContext};
use crate::outcome::TaskResult;

/// Callback invoked when the job is cancelled, before the condition of the
/// active step is re-tested.
pub type CancellationHook = Arc<dyn Fn() + Send + Sync>;

/// Watches the job token on behalf of one step.
///
/// When the job is cancelled the observer marks the job `Canceled`, runs
/// the hook, and re-tests the step condition. The step token is cancelled
/// only if the re-test does not hold, so a step whose condition accepts
/// cancellation keeps running.
///
/// Dropping the observer unregisters it. A cancellation that fired before
/// the watcher task got to run is handled synchronously on drop.
pub(crate) struct CancellationObserver {
    handle: JoinHandle<()>,
    reaction: Arc<Reaction>,
}

/// Everything the cancellation handler needs, run at most once.
struct Reaction {
    job: JobContext,
    ctx: Arc<StepContext>,
    condition: Condition,
    evaluator: Arc<dyn ConditionEvaluator>,
    hook: Option<CancellationHook>,
    fired: AtomicBool,
}

impl Reaction {
    fn fire(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        on_job_cancelled(
            &self.job,
            &self.ctx,
            &self.condition,
            self.evaluator.as_ref(),
            self.hook.as_ref(),
        );
    }
}

impl CancellationObserver {
    pub(crate) fn register(
        job: &JobContext,
        ctx: &Arc<StepContext>,
        condition: &Condition,
        evaluator: &Arc<dyn ConditionEvaluator>,
        hook: Option<&CancellationHook>,
    ) -> Self {
        let reaction = Arc::new(Reaction {
            job: job.clone(),
            ctx: Arc::clone(ctx),
            condition: condition.clone(),
            evaluator: Arc::clone(evaluator),
            hook: hook.cloned(),
            fired: AtomicBool::new(false),
        });

        let watcher = Arc::clone(&reaction);
        let handle = tokio::spawn(async move {
            watcher.job.cancellation_token().cancelled().await;
            watcher.fire();
        });
        Self { handle, reaction }
    }
}

impl Drop for CancellationObserver {
    fn drop(&mut self) {
        self.handle.abort();
        if self.reaction.job.is_cancelled() {
            self.reaction.fire();
        }
    }
}

fn on_job_cancelled(
    job: &JobContext,
    ctx: &StepContext,
    condition: &Condition,
    evaluator: &dyn ConditionEvaluator,
    hook: Option<&CancellationHook>,
) {
    job.set_result(Some(TaskResult::Canceled));
    if let Some(hook) = hook {
        hook();
    }

    ctx.debug(&format!(
        "Re-evaluate condition on job cancellation for step: '{}'.",
        ctx.display_name()
    ));
    let still_applies = if job.is_shutting_down() {
        ctx.debug("Skip Re-evaluate condition on agent shutdown.");
        false
    } else {
        match evaluator.evaluate(ctx, condition, true) {
            Ok(value) => value,
            Err(err) => {
                trace!(
                    "Caught error from expression when re-test condition on job cancellation: {}",
                    err
                );
                false
            }
        }
    };

    if !still_applies {
        info!("Cancel current running step.");
        ctx.cancel_token();
    }
}
