//! Variable records.

use std::collections::BTreeMap;

use crate::error::{Result, WorkerError};

/// A single pipeline variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Name as first written. Lookups ignore case.
    pub name: String,
    pub value: String,
    pub secret: bool,
    pub read_only: bool,
}

impl Variable {
    /// Create a variable, rejecting empty names.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        secret: bool,
        read_only: bool,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(WorkerError::invalid_argument(
                "name",
                "variable name must not be empty",
            ));
        }
        Ok(Self {
            name,
            value: value.into(),
            secret,
            read_only,
        })
    }
}

/// Initial value of a variable as supplied by the job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableValue {
    pub value: String,
    pub secret: bool,
    pub read_only: bool,
}

impl VariableValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
            read_only: false,
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::new(value)
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::new(value)
    }
}

/// Case-insensitive map of variables, keyed by the lower-cased name.
pub(crate) type VariableMap = BTreeMap<String, Variable>;

/// Map key for a variable name.
pub(crate) fn key_of(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_only_empty_names() {
        assert!(matches!(
            Variable::new("", "x", false, false),
            Err(WorkerError::InvalidArgument { .. })
        ));
        assert!(Variable::new("   ", "x", false, false).is_ok());
    }

    #[test]
    fn keys_ignore_case() {
        assert_eq!(key_of("Build.SourceBranch"), key_of("build.sourcebranch"));
    }

    #[test]
    fn value_constructors_set_flags() {
        assert!(!VariableValue::new("a").secret);
        assert!(VariableValue::secret("a").secret);
        assert_eq!(VariableValue::from("b").value, "b");
    }
}
