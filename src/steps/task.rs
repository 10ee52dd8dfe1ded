//! Task steps backed by external handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;

/// Executes a task on behalf of a [`TaskStep`].
///
/// Handlers should watch `ctx.cancellation_token()` and return
/// [`StepError::Canceled`] when they stop early because of it.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the task with macro-expanded `inputs`.
    async fn run(
        &self,
        ctx: Arc<StepContext>,
        inputs: BTreeMap<String, String>,
    ) -> Result<(), StepError>;
}

/// A step that runs a named task.
#[derive(Clone)]
pub struct TaskStep {
    /// Task reference as written in the job, e.g. `Delay@1`.
    pub reference: String,
    pub inputs: BTreeMap<String, String>,
    pub handler: Arc<dyn TaskHandler>,
}

impl TaskStep {
    pub fn new(reference: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            reference: reference.into(),
            inputs: BTreeMap::new(),
            handler,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub(crate) async fn run(&self, ctx: Arc<StepContext>) -> Result<(), StepError> {
        let variables = ctx.variables();
        let inputs = self
            .inputs
            .iter()
            .map(|(name, value)| (name.clone(), variables.expand_value(value)))
            .collect();

        ctx.debug(&format!("Running task '{}'", self.reference));
        self.handler.run(Arc::clone(&ctx), inputs).await
    }
}

impl std::fmt::Debug for TaskStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStep")
            .field("reference", &self.reference)
            .field("inputs", &self.inputs)
            .finish()
    }
}
