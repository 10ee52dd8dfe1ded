//! Step-level execution context.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::async_command::AsyncCommand;
use crate::error::StepError;
use crate::outcome::{self, TaskResult};
use crate::secrets::SecretMasker;
use crate::variables::VariableStore;

/// Kind of a step log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Section,
    Debug,
    Warning,
    Error,
    Output,
}

/// One masked line of the step log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct StepState {
    result: Option<TaskResult>,
    command_result: Option<TaskResult>,
    records: Vec<LogRecord>,
    warning_count: usize,
    error_count: usize,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    timer: Option<JoinHandle<()>>,
    async_commands: Vec<AsyncCommand>,
}

/// Mutable state of one step while it runs.
///
/// Shared through an `Arc` between the runner, the step body, async
/// commands and the cancellation observer.
pub struct StepContext {
    display_name: String,
    variables: Arc<VariableStore>,
    cancellation: CancellationToken,
    state: Mutex<StepState>,
}

impl StepContext {
    pub(crate) fn new(display_name: &str, variables: Arc<VariableStore>) -> Self {
        Self {
            display_name: display_name.to_string(),
            variables,
            cancellation: CancellationToken::new(),
            state: Mutex::new(StepState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StepState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    pub fn masker(&self) -> &Arc<dyn SecretMasker> {
        self.variables.masker()
    }

    /// Record the start timestamp.
    pub fn start(&self) {
        self.lock().started_at = Some(Utc::now());
        debug!("Step '{}' started", self.display_name);
    }

    /// Record the finish timestamp and stop the timeout timer.
    ///
    /// A given `result` replaces the current one. A step that completes
    /// without any result has succeeded.
    pub fn complete(&self, result: Option<TaskResult>) {
        let mut state = self.lock();
        if let Some(result) = result {
            state.result = Some(result);
        }
        state.result.get_or_insert(TaskResult::Succeeded);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.finished_at = Some(Utc::now());
        debug!(
            "Step '{}' completed: {}",
            self.display_name,
            state.result.unwrap_or(TaskResult::Succeeded)
        );
    }

    /// Arm the timeout. On expiry the step token is cancelled; the job
    /// token is never touched. `None` disarms any running timer.
    ///
    /// Must be called from within a tokio runtime when `timeout` is set.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if let Some(timeout) = timeout {
            let token = self.cancellation.clone();
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                token.cancel();
            }));
        }
    }

    /// Signal step level cancellation.
    pub fn cancel_token(&self) {
        self.cancellation.cancel();
    }

    /// The step cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn result(&self) -> Option<TaskResult> {
        self.lock().result
    }

    pub fn set_result(&self, result: Option<TaskResult>) {
        self.lock().result = result;
    }

    /// Result requested in-band by the step through logging commands.
    pub fn command_result(&self) -> Option<TaskResult> {
        self.lock().command_result
    }

    pub fn set_command_result(&self, result: Option<TaskResult>) {
        self.lock().command_result = result;
    }

    pub fn merge_command_result(&self, coming: TaskResult) -> TaskResult {
        let mut state = self.lock();
        let merged = outcome::merge(state.command_result, coming);
        state.command_result = Some(merged);
        merged
    }

    /// Spawn `future` as an async command attached to this step.
    ///
    /// The runner awaits every attached command after the step body
    /// returns, in the order they were added. Commands are never aborted:
    /// one that should stop on timeout or cancellation must watch
    /// [`cancellation_token`](StepContext::cancellation_token) itself.
    pub fn add_async_command<F>(&self, name: &str, future: F)
    where
        F: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        debug!("Step '{}' started async command '{}'", self.display_name, name);
        let command = AsyncCommand::spawn(name, future);
        self.lock().async_commands.push(command);
    }

    /// Remove and return the attached async commands.
    pub fn take_async_commands(&self) -> Vec<AsyncCommand> {
        std::mem::take(&mut self.lock().async_commands)
    }

    /// Masked log entries recorded so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().records.clone()
    }

    pub fn warning_count(&self) -> usize {
        self.lock().warning_count
    }

    pub fn error_count(&self) -> usize {
        self.lock().error_count
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.lock().finished_at
    }

    pub fn section(&self, message: &str) {
        self.write(LogLevel::Section, message);
    }

    pub fn debug(&self, message: &str) {
        self.write(LogLevel::Debug, message);
    }

    pub fn warning(&self, message: &str) {
        self.write(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.write(LogLevel::Error, message);
    }

    /// A line of step output.
    pub fn output(&self, line: &str) {
        self.write(LogLevel::Output, line);
    }

    fn write(&self, level: LogLevel, message: &str) {
        let message = self.masker().mask(message);
        match level {
            LogLevel::Section => info!("{}", message),
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
            LogLevel::Output => info!("{}", message),
        }

        let mut state = self.lock();
        match level {
            LogLevel::Warning => state.warning_count += 1,
            LogLevel::Error => state.error_count += 1,
            _ => {}
        }
        state.records.push(LogRecord {
            level,
            message,
            timestamp: Utc::now(),
        });
    }
}

impl Drop for StepContext {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StepContext")
            .field("display_name", &self.display_name)
            .field("result", &state.result)
            .field("command_result", &state.command_result)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
