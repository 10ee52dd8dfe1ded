//! Environment handed to step child processes.

use std::collections::BTreeMap;

use crate::variables::names::to_env_name;
use crate::variables::VariableStore;

/// Build the environment additions for a child process.
///
/// Every public variable is exported under its environment name
/// (`Build.SourcesDirectory` as `BUILD_SOURCESDIRECTORY`). Secret variables
/// are never exported. `extra` entries are macro-expanded and added under
/// their own names, overriding variables with the same environment name.
///
/// The current process environment is left alone; the caller passes the
/// returned map to the child.
pub fn build_child_environment(
    variables: &VariableStore,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = variables
        .public()
        .into_iter()
        .map(|(name, value)| (to_env_name(&name), value))
        .collect();

    for (name, value) in extra {
        env.insert(name.clone(), variables.expand_value(value));
    }
    env
}
