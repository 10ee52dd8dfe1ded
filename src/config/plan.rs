//! Turning a job definition into runnable steps.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::condition::Condition;
use crate::config::schema::{JobDefinition, StageDefinition, StepDefinition};
use crate::context::JobContext;
use crate::error::{Result, WorkerError};
use crate::secrets::SecretMasker;
use crate::steps::builtin::TaskRegistry;
use crate::steps::{ExtensionStep, ScriptStep, Step, StepKind, TaskStep};
use crate::variables::names::{SYSTEM_DEFAULT_WORKING_DIRECTORY, SYSTEM_JOB_NAME};
use crate::variables::{VariableStore, VariableValue};

/// Values supplied on the command line, applied over the job file.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub variables: Vec<(String, String)>,
    pub secrets: Vec<(String, String)>,
    pub working_directory: Option<PathBuf>,
}

/// Build the job's variable store.
///
/// Precedence, lowest first: job file variables, `overrides.variables`,
/// `overrides.secrets`. Secret values are registered with `masker` before
/// the store expands anything. Returns the store and any expansion
/// warnings.
pub fn build_variables(
    job: &JobDefinition,
    overrides: &JobOverrides,
    masker: Arc<dyn SecretMasker>,
) -> (VariableStore, Vec<String>) {
    let mut initial: Vec<(String, VariableValue)> = Vec::new();

    if let Some(name) = &job.name {
        initial.push((SYSTEM_JOB_NAME.to_string(), VariableValue::from(name.as_str())));
    }
    if let Some(dir) = &overrides.working_directory {
        initial.push((
            SYSTEM_DEFAULT_WORKING_DIRECTORY.to_string(),
            VariableValue::from(dir.to_string_lossy().to_string()),
        ));
    }

    for (name, definition) in &job.variables {
        let value = definition.value().unwrap_or_default();
        initial.push((
            name.clone(),
            VariableValue {
                value,
                secret: definition.is_secret(),
                read_only: definition.is_read_only(),
            },
        ));
    }
    for (name, value) in &overrides.variables {
        initial.push((name.clone(), VariableValue::from(value.as_str())));
    }
    for (name, value) in &overrides.secrets {
        initial.push((name.clone(), VariableValue::secret(value.as_str())));
    }

    for entry in initial.iter().filter(|(_, v)| v.secret && !v.value.is_empty()) {
        masker.add_value(&entry.1.value);
    }

    // Later entries replace earlier ones with the same name.
    let mut merged: Vec<(String, VariableValue)> = Vec::new();
    for (name, value) in initial {
        match merged
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => *slot = (name, value),
            None => merged.push((name, value)),
        }
    }

    VariableStore::new(masker, merged)
}

/// Materialize the enabled steps of `job`, each initialized with a fresh
/// step context from `ctx`.
///
/// Disabled steps are left out; the runner only accepts enabled steps.
///
/// # Errors
///
/// Returns `JobValidationError` for things [`validate_job`] would reject.
///
/// [`validate_job`]: crate::config::validate_job
pub fn build_steps(job: &JobDefinition, ctx: &JobContext, registry: &TaskRegistry) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for (index, definition) in job.steps.iter().enumerate() {
        if !definition.enabled {
            debug!("Step {} is disabled", index + 1);
            continue;
        }
        let mut step = build_step(index, definition, registry)?;
        step.initialize(ctx.create_step_context(&step.display_name));
        steps.push(step);
    }

    Ok(steps)
}

fn invalid(index: usize, message: impl Into<String>) -> WorkerError {
    WorkerError::JobValidationError {
        message: format!("Step {}: {}", index + 1, message.into()),
    }
}

fn build_step(index: usize, definition: &StepDefinition, registry: &TaskRegistry) -> Result<Step> {
    let kind = match (&definition.script, &definition.task, &definition.extension) {
        (Some(script), None, None) => StepKind::Script(ScriptStep {
            script: script.clone(),
            working_directory: definition.working_directory.clone(),
            env: definition.env.clone(),
        }),
        (None, Some(task), None) => {
            let handler = registry
                .task(task)
                .ok_or_else(|| invalid(index, format!("unknown task '{}'", task)))?;
            StepKind::Task(TaskStep {
                reference: task.clone(),
                inputs: definition.inputs.clone(),
                handler,
            })
        }
        (None, None, Some(name)) => {
            let extension = registry
                .extension(name)
                .ok_or_else(|| invalid(index, format!("unknown extension '{}'", name)))?;
            StepKind::Extension(match definition.stage {
                StageDefinition::Prepare => ExtensionStep::prepare(extension),
                StageDefinition::Cleanup => ExtensionStep::cleanup(extension),
            })
        }
        _ => {
            return Err(invalid(
                index,
                "must have exactly one of 'script', 'task' or 'extension'",
            ))
        }
    };

    let condition = match &definition.condition {
        Some(source) => Condition::parse(source).map_err(|e| invalid(index, e.to_string()))?,
        None => Condition::default(),
    };

    let timeout = match definition.timeout_in_minutes {
        None => None,
        Some(minutes) if minutes == 0.0 => None,
        Some(minutes) => Some(
            Duration::try_from_secs_f64(minutes * 60.0)
                .map_err(|_| invalid(index, format!("invalid timeoutInMinutes {}", minutes)))?,
        ),
    };

    Ok(Step::new(definition.resolved_display_name(), kind)
        .with_condition(condition)
        .with_continue_on_error(definition.continue_on_error)
        .with_timeout(timeout)
        .with_container(definition.container.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_job;
    use crate::secrets::RecordingMasker;
    use std::path::Path;

    fn job(yaml: &str) -> JobDefinition {
        parse_job(yaml, Path::new("job.yml")).unwrap()
    }

    #[test]
    fn overrides_take_precedence_and_secrets_are_registered() {
        let definition = job(
            "name: ci\nvariables:\n  Config: Debug\n  out: bin/$(config)\n  key:\n    value: k3y\n    secret: true\n",
        );
        let overrides = JobOverrides {
            variables: vec![("config".into(), "Release".into())],
            secrets: vec![("token".into(), "t0ken".into())],
            working_directory: Some(PathBuf::from("/work")),
        };
        let masker = Arc::new(RecordingMasker::new());

        let (store, warnings) = build_variables(&definition, &overrides, masker.clone());

        assert!(warnings.is_empty());
        assert_eq!(store.get("out").as_deref(), Some("bin/Release"));
        assert_eq!(store.get("System.JobName").as_deref(), Some("ci"));
        assert_eq!(store.get("system.defaultworkingdirectory").as_deref(), Some("/work"));
        assert!(store.variable("token").unwrap().secret);
        assert!(masker.was_registered("k3y"));
        assert!(masker.was_registered("t0ken"));
    }

    #[test]
    fn builds_enabled_steps_with_contexts() {
        let definition = job(
            r#"
steps:
  - script: echo one
    displayName: One
    timeoutInMinutes: 2
    continueOnError: true
  - script: echo skipped
    enabled: false
  - task: Delay@1
    condition: always()
  - extension: workspace
    stage: cleanup
"#,
        );
        let (store, _) = build_variables(&definition, &JobOverrides::default(), Arc::new(RecordingMasker::new()));
        let ctx = JobContext::new(Arc::new(store));

        let steps = build_steps(&definition, &ctx, &TaskRegistry::with_builtins()).unwrap();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].display_name, "One");
        assert_eq!(steps[0].timeout, Some(Duration::from_secs(120)));
        assert!(steps[0].continue_on_error);
        assert_eq!(steps[1].display_name, "Delay@1");
        assert_eq!(steps[1].condition, Condition::always());
        assert_eq!(steps[2].kind.label(), "extension");
        assert!(steps.iter().all(|s| s.context().is_some()));
    }

    #[test]
    fn zero_timeout_means_none() {
        let definition = job("steps:\n  - script: x\n    timeoutInMinutes: 0\n");
        let (store, _) = build_variables(&definition, &JobOverrides::default(), Arc::new(RecordingMasker::new()));
        let ctx = JobContext::new(Arc::new(store));

        let steps = build_steps(&definition, &ctx, &TaskRegistry::with_builtins()).unwrap();

        assert_eq!(steps[0].timeout, None);
    }

    #[test]
    fn unknown_task_is_rejected() {
        let definition = job("steps:\n  - task: Unknown@1\n");
        let ctx = JobContext::new(Arc::new(VariableStore::empty(Arc::new(RecordingMasker::new()))));

        let err = build_steps(&definition, &ctx, &TaskRegistry::with_builtins()).unwrap_err();

        assert!(err.to_string().contains("Unknown@1"));
    }
}
