//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.

pub mod dispatcher;
pub mod display;
pub mod report;
pub mod run;
pub mod validate;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, EXIT_CONFIG_ERROR, EXIT_FAILURE};
pub use display::OutputMode;
pub use report::{JobReport, StepReport};
