//! Tasks and extensions available to job files out of the box.
//!
//! | Name | Inputs |
//! |------|--------|
//! | `CmdLine` | `script`, `workingDirectory` |
//! | `Delay` | `delayForSeconds` or `delayForMinutes` |
//!
//! The `workspace` extension creates `System.DefaultWorkingDirectory`
//! before the first step.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;

use super::extension::JobExtension;
use super::script::ScriptStep;
use super::task::TaskHandler;
use crate::context::StepContext;
use crate::error::StepError;
use crate::variables::names::SYSTEM_DEFAULT_WORKING_DIRECTORY;

/// Runs the `script` input like a script step.
#[derive(Debug, Default)]
pub struct CommandLineTask;

#[async_trait]
impl TaskHandler for CommandLineTask {
    async fn run(
        &self,
        ctx: Arc<StepContext>,
        inputs: BTreeMap<String, String>,
    ) -> Result<(), StepError> {
        let script = inputs
            .get("script")
            .ok_or_else(|| anyhow!("Input required: script"))?;
        let mut step = ScriptStep::new(script.as_str());
        step.working_directory = inputs.get("workingDirectory").cloned();
        step.run(&ctx).await
    }
}

/// Waits for a fixed time, or until the step is cancelled.
#[derive(Debug, Default)]
pub struct DelayTask;

impl DelayTask {
    fn delay(inputs: &BTreeMap<String, String>) -> anyhow::Result<Duration> {
        if let Some(seconds) = inputs.get("delayForSeconds") {
            let seconds: f64 = seconds
                .trim()
                .parse()
                .with_context(|| format!("Invalid delayForSeconds '{}'", seconds))?;
            return Duration::try_from_secs_f64(seconds)
                .with_context(|| format!("Invalid delayForSeconds '{}'", seconds));
        }
        let minutes = inputs
            .get("delayForMinutes")
            .ok_or_else(|| anyhow!("Input required: delayForMinutes"))?;
        let value: f64 = minutes
            .trim()
            .parse()
            .with_context(|| format!("Invalid delayForMinutes '{}'", minutes))?;
        Duration::try_from_secs_f64(value * 60.0)
            .with_context(|| format!("Invalid delayForMinutes '{}'", minutes))
    }
}

#[async_trait]
impl TaskHandler for DelayTask {
    async fn run(
        &self,
        ctx: Arc<StepContext>,
        inputs: BTreeMap<String, String>,
    ) -> Result<(), StepError> {
        let delay = Self::delay(&inputs)?;
        ctx.output(&format!("Waiting for {:?}.", delay));
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = ctx.cancellation_token().cancelled() => Err(StepError::Canceled),
        }
    }
}

/// Prepares the default working directory.
#[derive(Debug, Default)]
pub struct WorkspaceExtension;

#[async_trait]
impl JobExtension for WorkspaceExtension {
    fn name(&self) -> &str {
        "workspace"
    }

    async fn prepare(&self, ctx: Arc<StepContext>) -> Result<(), StepError> {
        let Some(dir) = ctx.variables().get(SYSTEM_DEFAULT_WORKING_DIRECTORY) else {
            ctx.debug("No default working directory configured.");
            return Ok(());
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create working directory '{}'", dir))?;
        ctx.output(&format!("Working directory: {}", dir));
        Ok(())
    }

    async fn cleanup(&self, ctx: Arc<StepContext>) -> Result<(), StepError> {
        ctx.debug("Workspace left in place.");
        Ok(())
    }
}

/// Lookup table from task and extension names to implementations.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn TaskHandler>>,
    extensions: HashMap<String, Arc<dyn JobExtension>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in tasks and extensions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_task("CmdLine", Arc::new(CommandLineTask));
        registry.register_task("Delay", Arc::new(DelayTask));
        registry.register_extension(Arc::new(WorkspaceExtension));
        registry
    }

    pub fn register_task(&mut self, name: &str, handler: Arc<dyn TaskHandler>) {
        self.tasks.insert(name.to_ascii_lowercase(), handler);
    }

    pub fn register_extension(&mut self, extension: Arc<dyn JobExtension>) {
        self.extensions
            .insert(extension.name().to_ascii_lowercase(), extension);
    }

    /// Find the handler for a reference such as `Delay@1`.
    pub fn task(&self, reference: &str) -> Option<Arc<dyn TaskHandler>> {
        let name = reference.split('@').next().unwrap_or(reference).trim();
        self.tasks.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn extension(&self, name: &str) -> Option<Arc<dyn JobExtension>> {
        self.extensions.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<_> = self.extensions.keys().collect();
        extensions.sort();
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.task_names())
            .field("extensions", &extensions)
            .finish()
    }
}
