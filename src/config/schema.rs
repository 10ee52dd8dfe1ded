//! Job definition schema.
//!
//! These structs map to the YAML job file format:
//!
//! ```yaml
//! name: build
//! variables:
//!   configuration: Release
//!   token:
//!     value: abc123
//!     secret: true
//! steps:
//!   - script: make $(configuration)
//!     displayName: Build
//!     timeoutInMinutes: 10
//!   - task: Delay@1
//!     inputs:
//!       delayForSeconds: "1"
//!     condition: always()
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root of a job file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobDefinition {
    /// Job name, exported as `System.JobName`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Initial job variables.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, VariableDefinition>,

    /// Steps in execution order.
    pub steps: Vec<StepDefinition>,
}

/// A variable given either as a bare value or with flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableDefinition {
    Detailed(DetailedVariable),
    Scalar(serde_yaml::Value),
}

impl VariableDefinition {
    /// The value as text, or `None` if it is not a scalar.
    pub fn value(&self) -> Option<String> {
        match self {
            VariableDefinition::Detailed(detailed) => Some(detailed.value.clone()),
            VariableDefinition::Scalar(value) => scalar_to_string(value),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, VariableDefinition::Detailed(d) if d.secret)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, VariableDefinition::Detailed(d) if d.readonly)
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// A variable with explicit flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedVariable {
    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub secret: bool,

    #[serde(default)]
    pub readonly: bool,
}

/// Which stage of a job extension a step runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageDefinition {
    #[default]
    Prepare,
    Cleanup,
}

/// One step of a job file. Exactly one of `script`, `task` and
/// `extension` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StepDefinition {
    /// Inline script run by the platform shell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Task reference, e.g. `Delay@1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Job extension name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Extension stage (extension steps only).
    pub stage: StageDefinition,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Condition expression. Defaults to `succeeded()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    pub enabled: bool,

    pub continue_on_error: bool,

    /// Step timeout. Zero or absent means no timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_in_minutes: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl Default for StepDefinition {
    fn default() -> Self {
        Self {
            script: None,
            task: None,
            extension: None,
            stage: StageDefinition::default(),
            display_name: None,
            condition: None,
            enabled: true,
            continue_on_error: false,
            timeout_in_minutes: None,
            working_directory: None,
            env: BTreeMap::new(),
            inputs: BTreeMap::new(),
            container: None,
        }
    }
}

impl StepDefinition {
    /// Number of step kinds set.
    pub fn kind_count(&self) -> usize {
        [
            self.script.is_some(),
            self.task.is_some(),
            self.extension.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// The display name, falling back to one derived from the step kind.
    pub fn resolved_display_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        if let Some(task) = &self.task {
            return task.clone();
        }
        if let Some(extension) = &self.extension {
            return match self.stage {
                StageDefinition::Prepare => format!("Prepare: {}", extension),
                StageDefinition::Cleanup => format!("Cleanup: {}", extension),
            };
        }
        match self.script.as_deref().and_then(|s| s.lines().next()) {
            Some(first) if !first.trim().is_empty() => format!("Script: {}", first.trim()),
            _ => "Script".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_job() {
        let job: JobDefinition = serde_yaml::from_str("steps:\n  - script: echo hi\n").unwrap();
        assert_eq!(job.steps.len(), 1);
        let step = &job.steps[0];
        assert!(step.enabled);
        assert!(!step.continue_on_error);
        assert_eq!(step.kind_count(), 1);
        assert_eq!(step.resolved_display_name(), "Script: echo hi");
    }

    #[test]
    fn parses_variable_forms() {
        let yaml = r#"
variables:
  plain: text
  count: 5
  flag: true
  empty:
  key:
    value: abc
    secret: true
  locked:
    value: x
    readonly: true
"#;
        let job: JobDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(job.variables["plain"].value().as_deref(), Some("text"));
        assert_eq!(job.variables["count"].value().as_deref(), Some("5"));
        assert_eq!(job.variables["flag"].value().as_deref(), Some("true"));
        assert_eq!(job.variables["empty"].value().as_deref(), Some(""));
        assert!(job.variables["key"].is_secret());
        assert!(!job.variables["plain"].is_secret());
        assert!(job.variables["locked"].is_read_only());
    }

    #[test]
    fn non_scalar_variable_has_no_value() {
        let job: JobDefinition =
            serde_yaml::from_str("variables:\n  list: [1, 2]\n").unwrap();
        assert!(job.variables["list"].value().is_none());
    }

    #[test]
    fn parses_camel_case_step_fields() {
        let yaml = r#"
steps:
  - task: Delay@1
    displayName: Wait
    continueOnError: true
    enabled: false
    timeoutInMinutes: 1.5
    condition: always()
    inputs:
      delayForSeconds: "2"
  - extension: workspace
    stage: cleanup
"#;
        let job: JobDefinition = serde_yaml::from_str(yaml).unwrap();
        let task = &job.steps[0];
        assert_eq!(task.display_name.as_deref(), Some("Wait"));
        assert!(task.continue_on_error);
        assert!(!task.enabled);
        assert_eq!(task.timeout_in_minutes, Some(1.5));
        assert_eq!(task.inputs["delayForSeconds"], "2");

        let ext = &job.steps[1];
        assert_eq!(ext.stage, StageDefinition::Cleanup);
        assert_eq!(ext.resolved_display_name(), "Cleanup: workspace");
    }
}
