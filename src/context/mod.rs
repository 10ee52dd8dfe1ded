//! Execution contexts for jobs and steps.
//!
//! - [`JobContext`] - job result, job cancellation and shutdown tokens, and
//!   the shared variable store
//! - [`StepContext`] - per-step result, log, timeout and async commands
//! - [`AsyncCommand`] - background work a step leaves behind for the runner
//!   to drain

pub mod async_command;
pub mod job;
pub mod step;

pub use async_command::AsyncCommand;
pub use job::JobContext;
pub use step::{LogLevel, LogRecord, StepContext};
