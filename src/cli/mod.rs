//! Command-line interface for stepworker.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, RunArgs, ValidateArgs};
pub use commands::{Command, CommandDispatcher, CommandResult, OutputMode};
