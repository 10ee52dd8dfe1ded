//! Inline script steps.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::anyhow;

use crate::commands;
use crate::context::StepContext;
use crate::error::StepError;
use crate::shell::{build_child_environment, execute_streaming, CommandOptions};
use crate::variables::names::SYSTEM_DEFAULT_WORKING_DIRECTORY;

/// A script run through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct ScriptStep {
    pub script: String,
    pub working_directory: Option<String>,
    /// Extra environment for the child, macro-expanded before use.
    pub env: BTreeMap<String, String>,
}

impl ScriptStep {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let variables = ctx.variables();
        let script = variables.expand_value(&self.script);

        let cwd = self
            .working_directory
            .as_deref()
            .map(|dir| variables.expand_value(dir))
            .or_else(|| variables.get(SYSTEM_DEFAULT_WORKING_DIRECTORY))
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let options = CommandOptions {
            cwd,
            env: build_child_environment(variables, &self.env),
        };

        ctx.debug(&format!("Script contents: {}", script));
        let result = execute_streaming(&script, &options, |line| {
            if !commands::process_line(ctx, line.text()) {
                ctx.output(line.text());
            }
        })
        .await?;

        if result.success {
            return Ok(());
        }
        match result.exit_code {
            Some(code) => Err(anyhow!("Script exited with code '{}'.", code).into()),
            None => Err(anyhow!("Script was terminated by a signal.").into()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::{JobContext, LogLevel};
    use crate::secrets::ValueMasker;
    use crate::variables::VariableStore;
    use std::sync::Arc;

    fn step_context(vars: &[(&str, &str)]) -> Arc<StepContext> {
        let (store, _) = VariableStore::new(
            Arc::new(ValueMasker::new()),
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        );
        JobContext::new(Arc::new(store)).create_step_context("script")
    }

    fn output(ctx: &StepContext) -> Vec<String> {
        ctx.records()
            .into_iter()
            .filter(|r| r.level == LogLevel::Output)
            .map(|r| r.message)
            .collect()
    }

    #[tokio::test]
    async fn runs_expanded_script_with_variable_environment() {
        let ctx = step_context(&[("Greeting", "hello"), ("Build.Id", "42")]);
        let step = ScriptStep::new("echo $(Greeting); echo $BUILD_ID");

        step.run(&ctx).await.unwrap();

        assert_eq!(output(&ctx), vec!["hello", "42"]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let ctx = step_context(&[]);
        let err = ScriptStep::new("exit 4").run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("'4'"));
    }

    #[tokio::test]
    async fn logging_commands_are_consumed() {
        let ctx = step_context(&[]);
        let step = ScriptStep::new("echo '##vso[task.setvariable variable=out]done'; echo visible");

        step.run(&ctx).await.unwrap();

        assert_eq!(output(&ctx), vec!["visible"]);
        assert_eq!(ctx.variables().get("out").as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn uses_default_working_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().to_string_lossy().to_string();
        let ctx = step_context(&[("System.DefaultWorkingDirectory", dir.as_str())]);

        ScriptStep::new("pwd").run(&ctx).await.unwrap();

        let name = temp.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(output(&ctx)[0].ends_with(&name));
    }

    #[tokio::test]
    async fn step_env_overrides_and_secrets_stay_out() {
        let ctx = step_context(&[]);
        ctx.variables().set("Token", "s3cret", true).unwrap();
        let step = ScriptStep::new("echo \"[$TOKEN]\"; echo $EXTRA").with_env("EXTRA", "from-step");

        step.run(&ctx).await.unwrap();

        assert_eq!(output(&ctx), vec!["[]", "from-step"]);
    }
}
