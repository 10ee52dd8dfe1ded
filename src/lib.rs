//! stepworker - Job step execution engine for build and release agents.
//!
//! Runs an ordered list of job steps with per-step conditions, timeouts,
//! cancellation, async command draining and result aggregation, on top of a
//! recursive variable expansion engine.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`commands`] - In-band `##vso[...]` logging commands
//! - [`condition`] - Step condition expressions and their evaluation
//! - [`config`] - Job file loading, validation and materialization
//! - [`context`] - Job and step execution contexts
//! - [`error`] - Error types and result aliases
//! - [`outcome`] - Step and job results and how they merge
//! - [`runner`] - Sequential step execution
//! - [`secrets`] - Secret value masking
//! - [`shell`] - Shell command execution
//! - [`steps`] - Step kinds and built-in tasks
//! - [`variables`] - Variable store and macro expansion
//!
//! # Example
//!
//! ```
//! use stepworker::secrets::NoopMasker;
//! use stepworker::variables::VariableStore;
//! use std::sync::Arc;
//!
//! let (store, warnings) = VariableStore::new(
//!     Arc::new(NoopMasker),
//!     [("config", "Release"), ("out", "bin/$(config)")],
//! );
//! assert!(warnings.is_empty());
//! assert_eq!(store.get("out").as_deref(), Some("bin/Release"));
//! ```

pub mod cli;
pub mod commands;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod outcome;
pub mod runner;
pub mod secrets;
pub mod shell;
pub mod steps;
pub mod variables;

pub use error::{Result, StepError, WorkerError};
pub use outcome::TaskResult;
