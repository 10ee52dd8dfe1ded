//! In-band logging commands.
//!
//! Steps talk back to the runner by printing lines such as
//! `##vso[task.setvariable variable=name]value`. Each output line goes
//! through [`process_line`]; command lines are consumed and everything
//! else is ordinary output.

pub mod parser;

use tracing::debug;

use crate::context::StepContext;
use crate::outcome::TaskResult;

pub use parser::{parse_line, LoggingCommand, ParsedLine};

/// Handle one line of step output.
///
/// Returns `true` if the line was a logging command (valid or not) and
/// must not be echoed as output.
pub fn process_line(ctx: &StepContext, line: &str) -> bool {
    match parse_line(line) {
        ParsedLine::Text => false,
        ParsedLine::Malformed => {
            ctx.warning(&format!("Unable to process command '{}' successfully.", line));
            true
        }
        ParsedLine::Command(command) => {
            process_command(ctx, &command);
            true
        }
    }
}

/// Apply a parsed command to the step context.
pub fn process_command(ctx: &StepContext, command: &LoggingCommand) {
    debug!("Processing logging command '{}'", command.name());
    match (command.area.as_str(), command.event.as_str()) {
        ("task", "setvariable") => set_variable(ctx, command),
        ("task", "setsecret") => {
            ctx.masker().add_value(command.data.trim());
        }
        ("task", "complete") => complete(ctx, command),
        ("task", "logissue") => log_issue(ctx, command),
        _ => ctx.warning(&format!(
            "Unrecognized logging command '{}'.",
            command.name()
        )),
    }
}

fn set_variable(ctx: &StepContext, command: &LoggingCommand) {
    let Some(name) = command.property("variable").map(str::trim).filter(|n| !n.is_empty())
    else {
        ctx.warning("Logging command 'task.setvariable' requires the 'variable' property.");
        return;
    };

    let variables = ctx.variables();
    if variables.is_read_only(name) {
        ctx.warning(&format!("Can't update the read-only variable '{}'.", name));
        return;
    }

    let secret = command.flag("issecret");
    // The store registers secret values with the masker.
    if let Err(err) = variables.set_variable(name, command.data.as_str(), secret, command.flag("isreadonly")) {
        ctx.warning(&err.to_string());
        return;
    }
    if secret {
        ctx.debug(&format!("Set secret variable '{}'.", name));
    } else {
        ctx.debug(&format!("Set variable '{}' = '{}'.", name, command.data));
    }
}

fn complete(ctx: &StepContext, command: &LoggingCommand) {
    let result = match command.property("result") {
        None => TaskResult::Succeeded,
        Some(value) => match value.parse::<TaskResult>() {
            Ok(
                result @ (TaskResult::Succeeded
                | TaskResult::SucceededWithIssues
                | TaskResult::Failed),
            ) => result,
            _ => {
                ctx.warning(&format!(
                    "Invalid result '{}' for logging command 'task.complete'.",
                    value
                ));
                return;
            }
        },
    };

    if !command.data.is_empty() {
        ctx.debug(&command.data);
    }
    ctx.merge_command_result(result);
}

fn log_issue(ctx: &StepContext, command: &LoggingCommand) {
    match command.property("type").map(str::to_ascii_lowercase).as_deref() {
        Some("error") => ctx.error(&command.data),
        Some("warning") => ctx.warning(&command.data),
        other => ctx.warning(&format!(
            "Invalid issue type '{}' for logging command 'task.logissue'.",
            other.unwrap_or("")
        )),
    }
}
