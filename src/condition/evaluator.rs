//! Condition evaluation.

use tracing::trace;

use super::expression::{Condition, Expr};
use super::ConditionError;
use crate::context::StepContext;
use crate::outcome::TaskResult;

/// Decides whether a step should run.
///
/// Implementations must not block; the runner calls them inline between
/// steps and from the job cancellation observer.
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate `condition` against the current job status and variables.
    ///
    /// With `host_tracing_only` set, evaluation details go to the host trace
    /// only and never into the step log.
    fn evaluate(
        &self,
        ctx: &StepContext,
        condition: &Condition,
        host_tracing_only: bool,
    ) -> Result<bool, ConditionError>;
}

/// Evaluates the built-in status and comparison functions.
///
/// Status functions read `Agent.JobStatus`; an unset status counts as
/// succeeded.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusEvaluator;

impl StatusEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ConditionEvaluator for StatusEvaluator {
    fn evaluate(
        &self,
        ctx: &StepContext,
        condition: &Condition,
        host_tracing_only: bool,
    ) -> Result<bool, ConditionError> {
        let status = ctx.variables().job_status().unwrap_or(TaskResult::Succeeded);
        let scope = Scope {
            ctx,
            status,
            condition,
        };

        if host_tracing_only {
            trace!("Evaluating condition for '{}': {}", ctx.display_name(), condition);
        } else {
            ctx.debug(&format!("Evaluating: {}", condition));
        }

        let result = scope.eval(condition.root()).and_then(|v| scope.to_bool(&v));
        match &result {
            Ok(value) if host_tracing_only => trace!("Condition result: {}", value),
            Ok(value) => ctx.debug(&format!("Result: {}", value)),
            Err(err) => trace!("Condition evaluation failed: {}", err),
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Str(String),
}

struct Scope<'a> {
    ctx: &'a StepContext,
    status: TaskResult,
    condition: &'a Condition,
}

impl Scope<'_> {
    fn error(&self, message: String) -> ConditionError {
        ConditionError::Evaluation {
            expression: self.condition.to_string(),
            message,
        }
    }

    fn to_bool(&self, value: &Value) -> Result<bool, ConditionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::Str(s) if s.is_empty() || s.eq_ignore_ascii_case("false") => Ok(false),
            Value::Str(s) => Err(self.error(format!("cannot convert '{}' to a boolean", s))),
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ConditionError> {
        match expr {
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Literal(s) => Ok(Value::Str(s.clone())),
            Expr::Variable(name) => Ok(Value::Str(
                self.ctx.variables().get(name).unwrap_or_default(),
            )),
            Expr::Call { name, args } => self.call(name, args),
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> Result<Value, ConditionError> {
        use TaskResult::*;

        let value = match name {
            "always" => true,
            "succeeded" => matches!(self.status, Succeeded | SucceededWithIssues),
            "failed" => self.status == Failed,
            "canceled" => self.status == Canceled,
            "succeededorfailed" => matches!(self.status, Succeeded | SucceededWithIssues | Failed),
            "and" => {
                for arg in args {
                    if !self.to_bool(&self.eval(arg)?)? {
                        return Ok(Value::Bool(false));
                    }
                }
                true
            }
            "or" => {
                for arg in args {
                    if self.to_bool(&self.eval(arg)?)? {
                        return Ok(Value::Bool(true));
                    }
                }
                false
            }
            "not" => !self.to_bool(&self.eval(self.arg(args, 0)?)?)?,
            "eq" | "ne" => {
                let left = self.eval(self.arg(args, 0)?)?;
                let right = self.eval(self.arg(args, 1)?)?;
                let equal = values_equal(&left, &right);
                if name == "eq" {
                    equal
                } else {
                    !equal
                }
            }
            "contains" => {
                let haystack = as_text(&self.eval(self.arg(args, 0)?)?).to_lowercase();
                let needle = as_text(&self.eval(self.arg(args, 1)?)?).to_lowercase();
                haystack.contains(&needle)
            }
            other => return Err(self.error(format!("unrecognized function '{}'", other))),
        };

        Ok(Value::Bool(value))
    }

    fn arg<'e>(&self, args: &'e [Expr], index: usize) -> Result<&'e Expr, ConditionError> {
        args.get(index)
            .ok_or_else(|| self.error(format!("missing argument {}", index + 1)))
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Str(s) => s.clone(),
    }
}

/// Booleans compare by value; everything else compares as
/// case-insensitive text.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => as_text(left).to_lowercase() == as_text(right).to_lowercase(),
    }
}
