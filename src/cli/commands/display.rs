//! Shared display helpers for step and job results.

use console::Style;

use crate::context::StepContext;
use crate::outcome::TaskResult;

/// How much the CLI prints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl OutputMode {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Bracketed symbol for a result.
pub fn result_symbol(result: TaskResult) -> &'static str {
    match result {
        TaskResult::Succeeded => "[ok]",
        TaskResult::SucceededWithIssues => "[warn]",
        TaskResult::Failed => "[FAIL]",
        TaskResult::Canceled => "[cancel]",
        TaskResult::Skipped => "[skip]",
        TaskResult::Abandoned => "[abandon]",
    }
}

/// Style for a result: green for success, orange for issues, red for
/// failure, dim otherwise.
pub fn result_style(result: TaskResult) -> Style {
    match result {
        TaskResult::Succeeded => Style::new().green(),
        TaskResult::SucceededWithIssues => Style::new().color256(208),
        TaskResult::Failed => Style::new().red().bold(),
        TaskResult::Canceled | TaskResult::Abandoned => Style::new().red(),
        TaskResult::Skipped => Style::new().dim(),
    }
}

/// One summary line for a finished step.
///
/// Verbose output adds the duration and the warning and error counts.
pub fn step_line(ctx: &StepContext, mode: OutputMode) -> String {
    let result = ctx.result().unwrap_or(TaskResult::Skipped);
    let style = result_style(result);
    let mut line = format!(
        "  {} {} {} ({})",
        style.apply_to(result.display_char()),
        style.apply_to(result_symbol(result)),
        ctx.display_name(),
        result
    );

    if mode == OutputMode::Verbose {
        if let (Some(start), Some(end)) = (ctx.started_at(), ctx.finished_at()) {
            let millis = (end - start).num_milliseconds().max(0);
            let duration = Style::new().dim().apply_to(format_millis(millis));
            line.push_str(&format!(" in {}", duration));
        }
        let (warnings, errors) = (ctx.warning_count(), ctx.error_count());
        if warnings > 0 || errors > 0 {
            line.push_str(&format!(", {} warning(s), {} error(s)", warnings, errors));
        }
    }
    line
}

/// Final line for the job.
pub fn job_line(name: &str, result: TaskResult) -> String {
    format!(
        "Job '{}' finished: {}",
        name,
        result_style(result).apply_to(result)
    )
}

/// Exit code for a job result.
pub fn exit_code_for(result: TaskResult) -> u8 {
    if result.is_success() {
        0
    } else {
        super::dispatcher::EXIT_FAILURE
    }
}

fn format_millis(millis: i64) -> String {
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.1}s", millis as f64 / 1000.0)
    }
}
