//! Machine-readable job reports.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::LogLevel;
use crate::error::Result;
use crate::outcome::TaskResult;
use crate::steps::Step;

/// Outcome of a whole job run, written by `run --report`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub name: String,
    pub result: String,
    pub steps: Vec<StepReport>,
}

/// One step of a [`JobReport`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub warnings: usize,
    pub errors: usize,
    /// Masked warning and error messages, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl JobReport {
    pub fn new(name: &str, result: TaskResult, steps: &[Step]) -> Self {
        let steps = steps
            .iter()
            .map(|step| match step.context() {
                Some(ctx) => StepReport {
                    name: step.display_name.clone(),
                    result: ctx.result().map(|r| r.to_string()),
                    started_at: ctx.started_at(),
                    finished_at: ctx.finished_at(),
                    warnings: ctx.warning_count(),
                    errors: ctx.error_count(),
                    issues: ctx
                        .records()
                        .into_iter()
                        .filter(|r| matches!(r.level, LogLevel::Warning | LogLevel::Error))
                        .map(|r| r.message)
                        .collect(),
                },
                None => StepReport {
                    name: step.display_name.clone(),
                    result: None,
                    started_at: None,
                    finished_at: None,
                    warnings: 0,
                    errors: 0,
                    issues: Vec::new(),
                },
            })
            .collect();

        Self {
            name: name.to_string(),
            result: result.to_string(),
            steps,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use crate::secrets::NoopMasker;
    use crate::steps::{ScriptStep, StepKind};
    use crate::variables::VariableStore;
    use std::sync::Arc;

    fn finished_step(job: &JobContext, name: &str, result: TaskResult) -> Step {
        let mut step = Step::new(name, StepKind::Script(ScriptStep::new("true")));
        let ctx = job.create_step_context(name);
        ctx.start();
        ctx.error("it broke");
        ctx.complete(Some(result));
        step.initialize(ctx);
        step
    }

    #[test]
    fn report_collects_step_outcomes() {
        let job = JobContext::new(Arc::new(VariableStore::empty(Arc::new(NoopMasker))));
        let steps = vec![finished_step(&job, "Build", TaskResult::Failed)];

        let report = JobReport::new("ci", TaskResult::Failed, &steps);

        assert_eq!(report.result, "Failed");
        assert_eq!(report.steps[0].result.as_deref(), Some("Failed"));
        assert_eq!(report.steps[0].errors, 1);
        assert_eq!(report.steps[0].issues, vec!["it broke".to_string()]);
        assert!(report.steps[0].started_at.is_some());
    }

    #[test]
    fn report_is_written_as_camel_case_json() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("report.json");
        let job = JobContext::new(Arc::new(VariableStore::empty(Arc::new(NoopMasker))));
        let steps = vec![finished_step(&job, "Test", TaskResult::Succeeded)];

        JobReport::new("ci", TaskResult::Succeeded, &steps)
            .write_to(&path)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["name"], "ci");
        assert_eq!(value["steps"][0]["name"], "Test");
        assert!(value["steps"][0].get("startedAt").is_some());
    }
}
