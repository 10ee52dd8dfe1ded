//! Temporary variable overlays.

use std::collections::HashSet;

use super::store::VariableStore;
use crate::error::Result;

/// Variables set through a scope are removed again when it is dropped.
///
/// ```
/// use stepworker::secrets::NoopMasker;
/// use stepworker::variables::VariableStore;
/// use std::sync::Arc;
///
/// let store = VariableStore::empty(Arc::new(NoopMasker));
/// {
///     let mut scope = store.create_scope();
///     scope.set("task.displayname", "Build", false).unwrap();
///     assert!(store.contains("task.displayname"));
/// }
/// assert!(!store.contains("task.displayname"));
/// ```
pub struct VariableScope<'a> {
    store: &'a VariableStore,
    names: HashSet<String>,
}

impl<'a> VariableScope<'a> {
    pub(crate) fn new(store: &'a VariableStore) -> Self {
        Self {
            store,
            names: HashSet::new(),
        }
    }

    /// Set a variable for the lifetime of this scope.
    pub fn set(&mut self, name: &str, value: impl Into<String>, secret: bool) -> Result<()> {
        self.store.set(name, value, secret)?;
        self.names.insert(name.to_string());
        Ok(())
    }

    /// Names set through this scope.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Drop for VariableScope<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            // Names were validated when they were set.
            let _ = self.store.unset(name);
        }
    }
}
