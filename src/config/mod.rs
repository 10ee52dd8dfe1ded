//! Job file loading, validation and materialization.
//!
//! - Schema definitions in [`schema`]
//! - File loading in [`loader`]
//! - Validation in [`validator`]
//! - Building variables and steps in [`plan`]
//!
//! # Example
//!
//! ```
//! use stepworker::config::{load_job_file, validate_job};
//! use stepworker::steps::builtin::TaskRegistry;
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let path = temp.path().join("job.yml");
//! fs::write(&path, "name: test\nsteps:\n  - script: echo hi\n").unwrap();
//!
//! let job = load_job_file(&path).unwrap();
//! validate_job(&job, &TaskRegistry::with_builtins()).unwrap();
//! assert_eq!(job.name, Some("test".to_string()));
//! ```

pub mod loader;
pub mod plan;
pub mod schema;
pub mod validator;

pub use loader::{load_job_file, parse_job};
pub use plan::{build_steps, build_variables, JobOverrides};
pub use schema::{DetailedVariable, JobDefinition, StageDefinition, StepDefinition, VariableDefinition};
pub use validator::{validate_job, validate_job_errors, ValidationError};
