//! Job-level execution context.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::step::StepContext;
use crate::outcome::{self, TaskResult};
use crate::secrets::SecretMasker;
use crate::variables::VariableStore;

struct JobState {
    variables: Arc<VariableStore>,
    result: Mutex<Option<TaskResult>>,
    cancellation: CancellationToken,
    shutdown: CancellationToken,
}

/// Shared state of one running job.
///
/// Cloning is cheap and every clone refers to the same job. The result is
/// guarded by a mutex because the cancellation observer writes it from
/// another task while the runner loop is active.
#[derive(Clone)]
pub struct JobContext {
    state: Arc<JobState>,
}

impl JobContext {
    /// New job with its own cancellation and shutdown tokens.
    pub fn new(variables: Arc<VariableStore>) -> Self {
        Self::with_tokens(variables, CancellationToken::new(), CancellationToken::new())
    }

    /// New job driven by externally owned tokens.
    ///
    /// `cancellation` cancels the job (user cancel). `shutdown` signals that
    /// the host process itself is going away.
    pub fn with_tokens(
        variables: Arc<VariableStore>,
        cancellation: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: Arc::new(JobState {
                variables,
                result: Mutex::new(None),
                cancellation,
                shutdown,
            }),
        }
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.state.variables
    }

    pub fn masker(&self) -> &Arc<dyn SecretMasker> {
        self.state.variables.masker()
    }

    /// The job-level cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.state.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancellation.is_cancelled()
    }

    /// The host shutdown token.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.state.shutdown
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.shutdown.is_cancelled()
    }

    /// The aggregated job result so far. `None` until something sets it.
    pub fn result(&self) -> Option<TaskResult> {
        *self
            .state
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the job result and mirror it into `Agent.JobStatus`.
    pub fn set_result(&self, result: Option<TaskResult>) {
        let mut guard = self
            .state
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = result;
        self.state.variables.set_job_status(result);
        debug!("Job result set to {:?}", result);
    }

    /// Merge `coming` into the job result and return the new value.
    pub fn merge_result(&self, coming: TaskResult) -> TaskResult {
        let mut guard = self
            .state
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let merged = outcome::merge(*guard, coming);
        *guard = Some(merged);
        self.state.variables.set_job_status(Some(merged));
        debug!("Job result merged to {}", merged);
        merged
    }

    /// A fresh step context sharing this job's variables, with an
    /// independent step cancellation token.
    pub fn create_step_context(&self, display_name: &str) -> Arc<StepContext> {
        Arc::new(StepContext::new(
            display_name,
            Arc::clone(&self.state.variables),
        ))
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("result", &self.result())
            .field("cancelled", &self.is_cancelled())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
