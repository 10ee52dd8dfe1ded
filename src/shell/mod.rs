//! Shell command execution and child environments.

pub mod command;
pub mod environment;

pub use command::{execute_streaming, CommandOptions, CommandResult, OutputLine};
pub use environment::build_child_environment;
