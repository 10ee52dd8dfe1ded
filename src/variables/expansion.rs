//! Recursive macro expansion.
//!
//! Values reference other variables with `$(name)`. Expansion walks an
//! explicit stack of [`RecursionState`] frames instead of recursing, so
//! the depth bound ([`MAX_DEPTH`]) is exact and cycles are found by
//! scanning the stack for a repeated name.

use tracing::{trace, warn};

use super::names::{MACRO_PREFIX, MACRO_SUFFIX, MAX_DEPTH};
use super::variable::{key_of, Variable, VariableMap};
use crate::secrets::SecretMasker;

/// One frame of an in-progress expansion.
#[derive(Debug)]
struct RecursionState {
    name: String,
    value: String,
    /// Where scanning for the next macro resumes.
    start_index: usize,
    /// Byte offset of the current macro's prefix.
    prefix_index: usize,
    /// Byte offset of the current macro's suffix.
    suffix_index: usize,
}

impl RecursionState {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            start_index: 0,
            prefix_index: 0,
            suffix_index: 0,
        }
    }

    /// Locate the next `$(...)` candidate at or after `start_index`.
    fn find_next_macro(&mut self) -> Option<String> {
        if self.start_index >= self.value.len() {
            return None;
        }
        let prefix = self.value[self.start_index..].find(MACRO_PREFIX)? + self.start_index;
        let name_start = prefix + MACRO_PREFIX.len();
        let suffix = self.value[name_start..].find(MACRO_SUFFIX)? + name_start;
        self.prefix_index = prefix;
        self.suffix_index = suffix;
        Some(self.value[name_start..suffix].to_string())
    }
}

/// Why expansion of a variable was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExpansionFailure {
    ExceedsMaxDepth,
    CyclicalReference,
}

/// Outcome of expanding every variable in a map.
#[derive(Debug)]
pub(crate) struct Expansion {
    pub expanded: VariableMap,
    pub warnings: Vec<String>,
}

/// Build a new expanded map from `nonexpanded`.
///
/// Variables whose expansion fails keep their raw value and produce one
/// warning each. Secret results are registered with `masker`.
pub(crate) fn expand_all(nonexpanded: &VariableMap, masker: &dyn SecretMasker) -> Expansion {
    let mut expanded = nonexpanded.clone();
    let mut warnings = Vec::new();

    for (key, variable) in nonexpanded {
        trace!("Processing expansion for variable: '{}'", variable.name);
        match expand_variable(variable, nonexpanded) {
            Ok((value, secret)) => {
                if value == variable.value {
                    continue;
                }
                if secret && !value.is_empty() {
                    masker.add_value(&value);
                }
                expanded.insert(
                    key.clone(),
                    Variable {
                        name: variable.name.clone(),
                        value,
                        secret,
                        read_only: variable.read_only,
                    },
                );
            }
            Err(ExpansionFailure::ExceedsMaxDepth) => {
                warn!("Exceeds max depth.");
                warnings.push(format!(
                    "Variable '{}' exceeds max depth {}.",
                    variable.name, MAX_DEPTH
                ));
            }
            Err(ExpansionFailure::CyclicalReference) => {
                warn!("Cyclical reference detected.");
                warnings.push(format!(
                    "Variable '{}' contains a cyclical reference.",
                    variable.name
                ));
            }
        }
    }

    Expansion { expanded, warnings }
}

/// Expand a single variable against `variables`.
///
/// Returns the final value and whether any variable touched along the way
/// is secret.
fn expand_variable(
    root: &Variable,
    variables: &VariableMap,
) -> Result<(String, bool), ExpansionFailure> {
    let mut secret = root.secret;
    let mut stack: Vec<RecursionState> = Vec::new();
    let mut state = RecursionState::new(&root.name, &root.value);

    loop {
        while let Some(nested_name) = state.find_next_macro() {
            let nested = if nested_name.is_empty() {
                None
            } else {
                variables.get(&key_of(&nested_name))
            };

            let Some(nested) = nested else {
                // Not a known variable; leave the text as it is.
                state.start_index = state.prefix_index + 1;
                continue;
            };

            // The current frame is not on the stack yet.
            if stack.len() + 1 == MAX_DEPTH {
                return Err(ExpansionFailure::ExceedsMaxDepth);
            }

            let nested_key = key_of(&nested_name);
            if key_of(&state.name) == nested_key
                || stack.iter().any(|frame| key_of(&frame.name) == nested_key)
            {
                return Err(ExpansionFailure::CyclicalReference);
            }

            secret = secret || nested.secret;
            if !secret {
                trace!("Processing expansion for nested variable: '{}'", nested_name);
            }
            let child = RecursionState::new(&nested_name, &nested.value);
            stack.push(std::mem::replace(&mut state, child));
        }

        let Some(mut parent) = stack.pop() else {
            return Ok((state.value, secret));
        };

        let suffix_end = parent.suffix_index + MACRO_SUFFIX.len();
        parent.value = format!(
            "{}{}{}",
            &parent.value[..parent.prefix_index],
            state.value,
            &parent.value[suffix_end..]
        );
        parent.start_index = parent.prefix_index + state.value.len();
        state = parent;
        if !secret {
            trace!("Intermediate state '{}': '{}'", state.name, state.value);
        }
    }
}

/// Replace `$(name)` macros in `input` with values from `lookup`, in a
/// single pass. Unknown names are left as written.
pub fn substitute(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(prefix) = rest.find(MACRO_PREFIX) {
        let name_start = prefix + MACRO_PREFIX.len();
        let Some(suffix) = rest[name_start..].find(MACRO_SUFFIX).map(|i| i + name_start) else {
            break;
        };
        let name = &rest[name_start..suffix];
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => {
                result.push_str(&rest[..prefix]);
                result.push_str(&value);
                rest = &rest[suffix + MACRO_SUFFIX.len()..];
            }
            None => {
                result.push_str(&rest[..=prefix]);
                rest = &rest[prefix + 1..];
            }
        }
    }

    result.push_str(rest);
    result
}
