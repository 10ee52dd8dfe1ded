//! Step and job outcomes.
//!
//! Results are combined with [`merge`], a max over the order
//! `Succeeded < SucceededWithIssues < Failed < Canceled < Abandoned`.

use std::fmt;
use std::str::FromStr;

/// Outcome of a step or of a whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    /// Only ever set by the server side; never produced by the runner.
    Abandoned,
}

impl TaskResult {
    /// Position in the merge order. `Skipped` ranks with `Succeeded`.
    fn rank(self) -> u8 {
        match self {
            TaskResult::Succeeded | TaskResult::Skipped => 0,
            TaskResult::SucceededWithIssues => 1,
            TaskResult::Failed => 2,
            TaskResult::Canceled => 3,
            TaskResult::Abandoned => 4,
        }
    }

    /// Check if this outcome counts as a success.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TaskResult::Succeeded | TaskResult::SucceededWithIssues
        )
    }

    /// Get a display character for this outcome.
    pub fn display_char(&self) -> char {
        match self {
            TaskResult::Succeeded => '✓',
            TaskResult::SucceededWithIssues => '!',
            TaskResult::Failed => '✗',
            TaskResult::Canceled => '⊗',
            TaskResult::Skipped => '⊘',
            TaskResult::Abandoned => '?',
        }
    }
}

/// Merge an incoming outcome into the current one.
///
/// The worse outcome wins; on a tie the current value is kept.
pub fn merge(current: Option<TaskResult>, coming: TaskResult) -> TaskResult {
    match current {
        Some(current) if current.rank() >= coming.rank() => current,
        _ => coming,
    }
}

/// Fold a sequence of outcomes with [`merge`].
pub fn merge_all(results: impl IntoIterator<Item = TaskResult>) -> Option<TaskResult> {
    results
        .into_iter()
        .fold(None, |acc, next| Some(merge(acc, next)))
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskResult::Succeeded => "Succeeded",
            TaskResult::SucceededWithIssues => "SucceededWithIssues",
            TaskResult::Failed => "Failed",
            TaskResult::Canceled => "Canceled",
            TaskResult::Skipped => "Skipped",
            TaskResult::Abandoned => "Abandoned",
        };
        write!(f, "{}", s)
    }
}

/// Error returned when parsing an unknown outcome name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskResultError(pub String);

impl fmt::Display for ParseTaskResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown task result '{}'", self.0)
    }
}

impl std::error::Error for ParseTaskResultError {}

impl FromStr for TaskResult {
    type Err = ParseTaskResultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Ok(TaskResult::Succeeded),
            "succeededwithissues" => Ok(TaskResult::SucceededWithIssues),
            "failed" => Ok(TaskResult::Failed),
            "canceled" | "cancelled" => Ok(TaskResult::Canceled),
            "skipped" => Ok(TaskResult::Skipped),
            "abandoned" => Ok(TaskResult::Abandoned),
            _ => Err(ParseTaskResultError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use super::TaskResult::{Abandoned, Canceled, Failed, Skipped, Succeeded, SucceededWithIssues};

    #[test]
    fn merge_with_none_takes_incoming() {
        assert_eq!(merge(None, Failed), Failed);
        assert_eq!(merge(None, Skipped), Skipped);
    }

    #[test]
    fn merge_keeps_the_worse_outcome() {
        assert_eq!(merge(Some(Succeeded), SucceededWithIssues), SucceededWithIssues);
        assert_eq!(merge(Some(Failed), SucceededWithIssues), Failed);
        assert_eq!(merge(Some(Failed), Canceled), Canceled);
        assert_eq!(merge(Some(Canceled), Failed), Canceled);
        assert_eq!(merge(Some(Canceled), Abandoned), Abandoned);
    }

    #[test]
    fn merge_is_order_independent() {
        let orders = [
            [Succeeded, SucceededWithIssues, Failed],
            [Failed, Succeeded, SucceededWithIssues],
            [SucceededWithIssues, Failed, Succeeded],
            [Failed, SucceededWithIssues, Succeeded],
        ];
        for order in orders {
            assert_eq!(merge_all(order), Some(Failed));
        }
    }

    #[test]
    fn skipped_does_not_hide_failures() {
        assert_eq!(merge(Some(Skipped), Failed), Failed);
        assert_eq!(merge(Some(Succeeded), Skipped), Succeeded);
    }

    #[test]
    fn merge_all_of_nothing_is_none() {
        assert_eq!(merge_all(Vec::new()), None);
    }

    #[test]
    fn parses_display_names_case_insensitively() {
        for result in [Succeeded, SucceededWithIssues, Failed, Canceled, Skipped, Abandoned] {
            assert_eq!(result.to_string().parse::<TaskResult>(), Ok(result));
        }
        assert_eq!("FAILED".parse::<TaskResult>(), Ok(Failed));
        assert!("bogus".parse::<TaskResult>().is_err());
    }

    #[test]
    fn success_outcomes() {
        assert!(Succeeded.is_success());
        assert!(SucceededWithIssues.is_success());
        assert!(!Failed.is_success());
        assert!(!Skipped.is_success());
    }
}
