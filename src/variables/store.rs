//! The job-scoped variable store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, trace};

use super::expansion::{expand_all, substitute};
use super::names::{self, AGENT_JOB_STATUS, AGENT_READ_ONLY_VARIABLES};
use super::scope::VariableScope;
use super::variable::{key_of, Variable, VariableMap, VariableValue};
use crate::error::{Result, WorkerError};
use crate::outcome::TaskResult;
use crate::secrets::SecretMasker;

/// Pipeline variables for one job.
///
/// Holds the raw (`nonexpanded`) values, which are authoritative, and an
/// `expanded` map derived from them by [`recalculate_expanded`]. Mutations
/// are serialised by one mutex; reads go against the most recently
/// published expanded map and never see a half-built one.
///
/// `set` and `unset` do not re-expand. Callers mutate in bulk and then call
/// [`recalculate_expanded`] once.
///
/// # Example
///
/// ```
/// use stepworker::secrets::ValueMasker;
/// use stepworker::variables::VariableStore;
/// use std::sync::Arc;
///
/// let store = VariableStore::empty(Arc::new(ValueMasker::new()));
/// store.set("configuration", "Release", false).unwrap();
/// store.set("output", "bin/$(configuration)", false).unwrap();
/// let warnings = store.recalculate_expanded();
///
/// assert!(warnings.is_empty());
/// assert_eq!(store.get("OUTPUT").as_deref(), Some("bin/Release"));
/// ```
///
/// [`recalculate_expanded`]: VariableStore::recalculate_expanded
pub struct VariableStore {
    masker: Arc<dyn SecretMasker>,
    nonexpanded: Mutex<VariableMap>,
    expanded: RwLock<Arc<VariableMap>>,
}

impl VariableStore {
    /// Create a store from the job's initial variables and expand them.
    ///
    /// Entries with blank names are dropped. Initial secret values are
    /// assumed to be registered with the masker already.
    pub fn new<I, K, V>(masker: Arc<dyn SecretMasker>, initial: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<VariableValue>,
    {
        let mut nonexpanded = VariableMap::new();
        let mut dropped = 0usize;
        for (name, value) in initial {
            let name: String = name.into();
            if name.trim().is_empty() {
                dropped += 1;
                continue;
            }
            let value = value.into();
            match Variable::new(name, value.value, value.secret, value.read_only) {
                Ok(variable) => {
                    nonexpanded.insert(key_of(&variable.name), variable);
                }
                Err(err) => debug!("Skip initial variable: {}", err),
            }
        }
        if dropped > 0 {
            debug!("Remove {} variables with empty variable name.", dropped);
        }

        let store = Self {
            masker,
            expanded: RwLock::new(Arc::new(nonexpanded.clone())),
            nonexpanded: Mutex::new(nonexpanded),
        };
        let warnings = store.recalculate_expanded();
        (store, warnings)
    }

    /// Create a store with no variables.
    pub fn empty(masker: Arc<dyn SecretMasker>) -> Self {
        Self::new(masker, Vec::<(String, VariableValue)>::new()).0
    }

    /// The masker secrets are registered with.
    pub fn masker(&self) -> &Arc<dyn SecretMasker> {
        &self.masker
    }

    fn lock(&self) -> MutexGuard<'_, VariableMap> {
        self.nonexpanded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current expanded map. Cheap: clones an `Arc`.
    fn snapshot(&self) -> Arc<VariableMap> {
        self.expanded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, map: VariableMap) {
        *self.expanded.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(map);
    }

    fn update_published(&self, f: impl FnOnce(&mut VariableMap)) {
        let mut published = self.expanded.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut published));
    }

    /// Get the expanded value of a variable.
    pub fn get(&self, name: &str) -> Option<String> {
        match self.snapshot().get(&key_of(name)) {
            Some(variable) => {
                trace!("Get '{}'", name);
                Some(variable.value.clone())
            }
            None => {
                trace!("Get '{}' (not found)", name);
                None
            }
        }
    }

    /// Get the full expanded record of a variable.
    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.snapshot().get(&key_of(name)).cloned()
    }

    /// Get the raw, unexpanded value of a variable.
    pub fn get_raw(&self, name: &str) -> Option<String> {
        self.lock().get(&key_of(name)).map(|v| v.value.clone())
    }

    /// Parse a variable as a boolean (`true`/`false`, any case).
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        let value = self.get(name)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Parse a variable as an integer.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name)?.trim().parse().ok()
    }

    /// Parse a variable as a task result.
    pub fn get_result(&self, name: &str) -> Option<TaskResult> {
        self.get(name)?.parse().ok()
    }

    /// Whether a variable is currently defined.
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(&key_of(name))
    }

    /// Number of defined variables.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The job outcome recorded in `Agent.JobStatus`.
    pub fn job_status(&self) -> Option<TaskResult> {
        self.get_result(AGENT_JOB_STATUS)
    }

    /// Record the job outcome in `Agent.JobStatus`.
    pub fn set_job_status(&self, result: Option<TaskResult>) {
        let value = result.map(|r| r.to_string()).unwrap_or_default();
        if let Err(err) = self.set(AGENT_JOB_STATUS, value, false) {
            debug!("Failed to record job status: {}", err);
        }
    }

    /// Set a variable.
    ///
    /// See [`set_variable`](VariableStore::set_variable).
    pub fn set(&self, name: &str, value: impl Into<String>, secret: bool) -> Result<()> {
        self.set_variable(name, value, secret, false)
    }

    /// Set a variable with explicit flags.
    ///
    /// If the variable is currently a secret the new value is a secret too,
    /// so a secret can never move into an unmasked slot. Secret values are
    /// registered with the masker. The value is stored as-is in both maps.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` is empty.
    pub fn set_variable(
        &self,
        name: &str,
        value: impl Into<String>,
        secret: bool,
        read_only: bool,
    ) -> Result<()> {
        let value = value.into();
        let key = key_of(name);
        let mut nonexpanded = self.lock();

        let secret = secret || self.snapshot().get(&key).map(|v| v.secret).unwrap_or(false);
        let variable = Variable::new(name, value, secret, read_only)?;
        if secret && !variable.value.is_empty() {
            self.masker.add_value(&variable.value);
        }

        if secret {
            trace!("Set '{}' = '***'", name);
        } else {
            trace!("Set '{}' = '{}'", name, variable.value);
        }
        nonexpanded.insert(key.clone(), variable.clone());
        self.update_published(|expanded| {
            expanded.insert(key, variable);
        });
        Ok(())
    }

    /// Remove a variable. Removing an absent variable is not an error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `name` is empty.
    pub fn unset(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(WorkerError::invalid_argument(
                "name",
                "variable name must not be empty",
            ));
        }
        let key = key_of(name);
        let mut nonexpanded = self.lock();
        nonexpanded.remove(&key);
        self.update_published(|expanded| {
            expanded.remove(&key);
        });
        trace!("Unset '{}'", name);
        Ok(())
    }

    /// Rebuild the expanded map from the raw values.
    ///
    /// Returns one warning per variable whose expansion was abandoned
    /// (cyclical reference or max depth exceeded).
    pub fn recalculate_expanded(&self) -> Vec<String> {
        let nonexpanded = self.lock();
        let expansion = expand_all(&nonexpanded, self.masker.as_ref());
        self.publish(expansion.expanded);
        expansion.warnings
    }

    /// Rewrite every expanded value through `function`.
    ///
    /// Changed values replace both the raw and the expanded entry; flags
    /// are kept.
    pub fn transform(&self, function: impl Fn(&str) -> String) {
        let mut nonexpanded = self.lock();
        let modified: Vec<(String, Variable)> = self
            .snapshot()
            .iter()
            .filter_map(|(key, variable)| {
                let new_value = function(&variable.value);
                (new_value != variable.value).then(|| {
                    let mut changed = variable.clone();
                    changed.value = new_value;
                    (key.clone(), changed)
                })
            })
            .collect();

        if modified.is_empty() {
            return;
        }
        self.update_published(|expanded| {
            for (key, variable) in &modified {
                expanded.insert(key.clone(), variable.clone());
            }
        });
        nonexpanded.extend(modified);
    }

    /// Non-secret expanded variables as `(name, value)` pairs.
    pub fn public(&self) -> Vec<(String, String)> {
        self.snapshot()
            .values()
            .filter(|v| !v.secret)
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    /// Secret expanded variables as `(name, value)` pairs.
    pub fn secrets(&self) -> Vec<(String, String)> {
        self.snapshot()
            .values()
            .filter(|v| v.secret)
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    /// Replace `$(name)` macros in an arbitrary string from the expanded
    /// values. Unknown macros are left as written.
    pub fn expand_value(&self, input: &str) -> String {
        let snapshot = self.snapshot();
        substitute(input, |name| {
            snapshot.get(&key_of(name)).map(|v| v.value.clone())
        })
    }

    /// Whether writes to `name` from step output must be refused.
    ///
    /// Only enforced when `agent.readOnlyVariables` is `true`; then a
    /// variable is read-only if it was flagged so or is a reserved system
    /// variable.
    pub fn is_read_only(&self, name: &str) -> bool {
        if !self.get_bool(AGENT_READ_ONLY_VARIABLES).unwrap_or(false) {
            return false;
        }
        let key = key_of(name);
        let flagged = match self.snapshot().get(&key) {
            Some(variable) => variable.read_only,
            None => self.lock().get(&key).map(|v| v.read_only).unwrap_or(false),
        };
        flagged || names::is_reserved(name)
    }

    /// Start a scope whose variables are removed when it is dropped.
    pub fn create_scope(&self) -> VariableScope<'_> {
        VariableScope::new(self)
    }
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
            .field("len", &self.len())
            .finish()
    }
}
