//! Runnable job steps.
//!
//! - [`Step`] - display name, gating flags and the step body
//! - [`StepKind`] - script, task or job extension body, fixed when the step
//!   is built
//! - [`TaskHandler`] / [`JobExtension`] - traits external task and extension
//!   implementations provide
//! - [`builtin`] - handlers the `stepworker` binary ships with
//!
//! # Example
//!
//! ```no_run
//! use stepworker::condition::Condition;
//! use stepworker::steps::{ScriptStep, Step, StepKind};
//! use std::time::Duration;
//!
//! let step = Step::new("Build", StepKind::Script(ScriptStep::new("make all")))
//!     .with_condition(Condition::succeeded_or_failed())
//!     .with_timeout(Some(Duration::from_secs(600)))
//!     .with_continue_on_error(true);
//! assert!(step.enabled);
//! ```

pub mod builtin;
pub mod extension;
pub mod script;
pub mod task;

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use crate::condition::Condition;
use crate::context::StepContext;
use crate::error::StepError;

pub use extension::{ExtensionStage, ExtensionStep, JobExtension};
pub use script::ScriptStep;
pub use task::{TaskHandler, TaskStep};

/// What a step runs.
#[derive(Clone)]
pub enum StepKind {
    Script(ScriptStep),
    Task(TaskStep),
    Extension(ExtensionStep),
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Script(_) => "script",
            StepKind::Task(_) => "task",
            StepKind::Extension(_) => "extension",
        }
    }
}

impl std::fmt::Debug for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Script(script) => f.debug_tuple("Script").field(script).finish(),
            StepKind::Task(task) => f.debug_tuple("Task").field(&task.reference).finish(),
            StepKind::Extension(ext) => f
                .debug_tuple("Extension")
                .field(&ext.extension.name())
                .field(&ext.stage)
                .finish(),
        }
    }
}

/// One unit of work in a job.
#[derive(Debug, Clone)]
pub struct Step {
    pub display_name: String,
    pub condition: Condition,
    pub enabled: bool,
    pub continue_on_error: bool,
    pub timeout: Option<Duration>,
    /// Name of the execution container the step targets, if any.
    pub container: Option<String>,
    pub kind: StepKind,
    context: Option<Arc<StepContext>>,
}

impl Step {
    /// An enabled step with the default `succeeded()` condition and no
    /// timeout.
    pub fn new(display_name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            display_name: display_name.into(),
            condition: Condition::default(),
            enabled: true,
            continue_on_error: false,
            timeout: None,
            container: None,
            kind,
            context: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_container(mut self, container: Option<String>) -> Self {
        self.container = container;
        self
    }

    /// Attach the execution context the step runs with.
    pub fn initialize(&mut self, ctx: Arc<StepContext>) {
        self.context = Some(ctx);
    }

    pub fn context(&self) -> Option<&Arc<StepContext>> {
        self.context.as_ref()
    }

    /// Run the step body.
    ///
    /// Bodies observe the step cancellation token and report
    /// [`StepError::Canceled`] when they stop because of it.
    pub async fn run(&self) -> Result<(), StepError> {
        let ctx = self
            .context
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| anyhow!("Step '{}' has not been initialized.", self.display_name))?;

        match &self.kind {
            StepKind::Script(script) => script.run(&ctx).await,
            StepKind::Task(task) => task.run(ctx).await,
            StepKind::Extension(ext) => ext.run(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use crate::secrets::NoopMasker;
    use crate::variables::VariableStore;

    #[test]
    fn new_step_uses_defaults() {
        let step = Step::new("Build", StepKind::Script(ScriptStep::new("true")));
        assert_eq!(step.condition, Condition::succeeded());
        assert!(step.enabled);
        assert!(!step.continue_on_error);
        assert!(step.timeout.is_none());
        assert!(step.context().is_none());
        assert_eq!(step.kind.label(), "script");
    }

    #[tokio::test]
    async fn run_without_context_fails() {
        let step = Step::new("Orphan", StepKind::Script(ScriptStep::new("true")));
        let err = step.run().await.unwrap_err();
        assert!(err.to_string().contains("Orphan"));
    }

    #[test]
    fn initialize_attaches_context() {
        let job = JobContext::new(Arc::new(VariableStore::empty(Arc::new(NoopMasker))));
        let mut step = Step::new("Build", StepKind::Script(ScriptStep::new("true")));
        step.initialize(job.create_step_context("Build"));
        assert_eq!(step.context().unwrap().display_name(), "Build");
    }
}
