//! Masking of secret values in log output.

use std::collections::HashSet;
use std::sync::RwLock;

/// Collaborator that learns secret values and hides them from logs.
///
/// Registration is fire-and-forget: duplicates and empty values are
/// accepted and ignored.
pub trait SecretMasker: Send + Sync {
    /// Register a value that must never appear in output.
    fn add_value(&self, value: &str);

    /// Replace every registered value in `input`.
    fn mask(&self, input: &str) -> String;
}

/// Masks registered values with a fixed replacement string.
///
/// # Example
///
/// ```
/// use stepworker::secrets::{SecretMasker, ValueMasker};
///
/// let masker = ValueMasker::new();
/// masker.add_value("super-secret-value");
///
/// let output = masker.mask("The key is super-secret-value here");
/// assert_eq!(output, "The key is *** here");
/// ```
#[derive(Debug)]
pub struct ValueMasker {
    /// Registered values, kept sorted longest first so that a secret
    /// containing another secret is replaced whole.
    values: RwLock<Vec<String>>,
    /// The mask string to use.
    mask: String,
    /// Values shorter than this are not registered.
    min_length: usize,
}

impl ValueMasker {
    /// Create a new masker with the default `***` mask.
    pub fn new() -> Self {
        Self::with_mask("***")
    }

    /// Create a masker with a custom mask string.
    ///
    /// ```
    /// use stepworker::secrets::{SecretMasker, ValueMasker};
    ///
    /// let masker = ValueMasker::with_mask("[REDACTED]");
    /// masker.add_value("password123");
    /// assert_eq!(masker.mask("password: password123"), "password: [REDACTED]");
    /// ```
    pub fn with_mask(mask: impl Into<String>) -> Self {
        Self {
            values: RwLock::new(Vec::new()),
            mask: mask.into(),
            min_length: 1,
        }
    }

    /// Ignore values shorter than `min_length` characters.
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length.max(1);
        self
    }

    /// Get the number of registered secrets.
    pub fn secret_count(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    /// Check whether a value has been registered.
    pub fn contains(&self, value: &str) -> bool {
        self.values
            .read()
            .map(|v| v.iter().any(|s| s == value))
            .unwrap_or(false)
    }
}

impl Default for ValueMasker {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretMasker for ValueMasker {
    fn add_value(&self, value: &str) {
        if value.chars().count() < self.min_length {
            return;
        }
        let Ok(mut values) = self.values.write() else {
            return;
        };
        if values.iter().any(|s| s == value) {
            return;
        }
        values.push(value.to_string());
        values.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    fn mask(&self, input: &str) -> String {
        let Ok(values) = self.values.read() else {
            return input.to_string();
        };
        let mut result = input.to_string();
        for secret in values.iter() {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), &self.mask);
            }
        }
        result
    }
}

/// A masker that remembers nothing. Useful where masking is handled elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMasker;

impl SecretMasker for NoopMasker {
    fn add_value(&self, _value: &str) {}

    fn mask(&self, input: &str) -> String {
        input.to_string()
    }
}

/// Collect the distinct values registered by a test run.
///
/// Wraps another masker and records each incoming value.
#[derive(Debug, Default)]
pub struct RecordingMasker {
    inner: ValueMasker,
    seen: RwLock<HashSet<String>>,
}

impl RecordingMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `value` was ever passed to [`SecretMasker::add_value`].
    pub fn was_registered(&self, value: &str) -> bool {
        self.seen
            .read()
            .map(|seen| seen.contains(value))
            .unwrap_or(false)
    }
}

impl SecretMasker for RecordingMasker {
    fn add_value(&self, value: &str) {
        if let Ok(mut seen) = self.seen.write() {
            seen.insert(value.to_string());
        }
        self.inner.add_value(value);
    }

    fn mask(&self, input: &str) -> String {
        self.inner.mask(input)
    }
}
