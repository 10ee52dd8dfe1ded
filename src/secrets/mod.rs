//! Secret masking.
//!
//! The execution engine only needs to *register* secret values; it does so
//! through the [`SecretMasker`] trait. [`ValueMasker`] is the default
//! implementation used by the binary and by log output.
//!
//! # Example
//!
//! ```
//! use stepworker::secrets::{SecretMasker, ValueMasker};
//! use std::sync::Arc;
//!
//! let masker: Arc<dyn SecretMasker> = Arc::new(ValueMasker::new());
//! masker.add_value("hunter2");
//! assert_eq!(masker.mask("password=hunter2"), "password=***");
//! ```

pub mod mask;

pub use mask::{NoopMasker, RecordingMasker, SecretMasker, ValueMasker};
