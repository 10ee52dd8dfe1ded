//! Job definition validation.

use crate::condition::Condition;
use crate::config::schema::JobDefinition;
use crate::error::{Result, WorkerError};
use crate::steps::builtin::TaskRegistry;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Short rule identifier, e.g. `missing-kind`.
    pub rule: String,
    pub message: String,
    /// Index of the offending step, if any.
    pub step: Option<usize>,
}

impl ValidationError {
    fn step(rule: &str, index: usize, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            step: Some(index),
        }
    }
}

/// Collect every problem in `job`.
///
/// Task and extension names are checked against `registry`.
pub fn validate_job_errors(job: &JobDefinition, registry: &TaskRegistry) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, definition) in &job.variables {
        if name.trim().is_empty() {
            errors.push(ValidationError {
                rule: "empty-variable-name".to_string(),
                message: "Variable names must not be empty".to_string(),
                step: None,
            });
        } else if definition.value().is_none() {
            errors.push(ValidationError {
                rule: "invalid-variable".to_string(),
                message: format!("Variable '{}' must be a scalar or {{ value, secret, readonly }}", name),
                step: None,
            });
        }
    }

    for (index, step) in job.steps.iter().enumerate() {
        let label = format!("Step {}", index + 1);

        match step.kind_count() {
            0 => errors.push(ValidationError::step(
                "missing-kind",
                index,
                format!("{} must have one of 'script', 'task' or 'extension'", label),
            )),
            1 => {}
            _ => errors.push(ValidationError::step(
                "multiple-kinds",
                index,
                format!("{} must have only one of 'script', 'task' or 'extension'", label),
            )),
        }

        if step
            .display_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            errors.push(ValidationError::step(
                "empty-display-name",
                index,
                format!("{} has an empty displayName", label),
            ));
        }

        if let Some(condition) = &step.condition {
            if let Err(err) = Condition::parse(condition) {
                errors.push(ValidationError::step(
                    "invalid-condition",
                    index,
                    format!("{}: {}", label, err),
                ));
            }
        }

        if let Some(minutes) = step.timeout_in_minutes {
            if !minutes.is_finite() || minutes < 0.0 {
                errors.push(ValidationError::step(
                    "invalid-timeout",
                    index,
                    format!("{} has an invalid timeoutInMinutes: {}", label, minutes),
                ));
            }
        }

        if let Some(task) = &step.task {
            if registry.task(task).is_none() {
                errors.push(ValidationError::step(
                    "unknown-task",
                    index,
                    format!("{} uses unknown task '{}'", label, task),
                ));
            }
        }

        if let Some(extension) = &step.extension {
            if registry.extension(extension).is_none() {
                errors.push(ValidationError::step(
                    "unknown-extension",
                    index,
                    format!("{} uses unknown extension '{}'", label, extension),
                ));
            }
        }
    }

    errors
}

/// Validate `job`, joining every problem into one error.
pub fn validate_job(job: &JobDefinition, registry: &TaskRegistry) -> Result<()> {
    let errors = validate_job_errors(job, registry);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(WorkerError::JobValidationError {
            message: messages.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StepDefinition;

    fn job_with(steps: Vec<StepDefinition>) -> JobDefinition {
        JobDefinition {
            steps,
            ..Default::default()
        }
    }

    fn rules(job: &JobDefinition) -> Vec<String> {
        validate_job_errors(job, &TaskRegistry::with_builtins())
            .into_iter()
            .map(|e| e.rule)
            .collect()
    }

    #[test]
    fn valid_job_passes() {
        let job = job_with(vec![StepDefinition {
            script: Some("echo hi".into()),
            condition: Some("always()".into()),
            ..Default::default()
        }]);
        assert!(validate_job(&job, &TaskRegistry::with_builtins()).is_ok());
    }

    #[test]
    fn step_needs_exactly_one_kind() {
        let job = job_with(vec![
            StepDefinition::default(),
            StepDefinition {
                script: Some("a".into()),
                task: Some("Delay@1".into()),
                ..Default::default()
            },
        ]);
        assert_eq!(rules(&job), vec!["missing-kind", "multiple-kinds"]);
    }

    #[test]
    fn rejects_blank_display_name_and_bad_condition() {
        let job = job_with(vec![StepDefinition {
            script: Some("a".into()),
            display_name: Some("  ".into()),
            condition: Some("sometimes()".into()),
            ..Default::default()
        }]);
        assert_eq!(rules(&job), vec!["empty-display-name", "invalid-condition"]);
    }

    #[test]
    fn rejects_negative_timeout() {
        let job = job_with(vec![StepDefinition {
            script: Some("a".into()),
            timeout_in_minutes: Some(-1.0),
            ..Default::default()
        }]);
        assert_eq!(rules(&job), vec!["invalid-timeout"]);
    }

    #[test]
    fn rejects_unknown_task_and_extension() {
        let job = job_with(vec![
            StepDefinition {
                task: Some("Nope@1".into()),
                ..Default::default()
            },
            StepDefinition {
                extension: Some("nope".into()),
                ..Default::default()
            },
        ]);
        assert_eq!(rules(&job), vec!["unknown-task", "unknown-extension"]);
    }

    #[test]
    fn validate_job_joins_messages() {
        let job = job_with(vec![StepDefinition::default(), StepDefinition::default()]);
        let err = validate_job(&job, &TaskRegistry::with_builtins()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Step 1"));
        assert!(msg.contains("Step 2"));
    }
}
