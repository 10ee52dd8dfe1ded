//! Background work attached to a step.

use std::future::Future;

use anyhow::anyhow;
use tokio::task::{JoinError, JoinHandle};

use crate::error::StepError;

/// A spawned future the runner must await after the step body returns.
#[derive(Debug)]
pub struct AsyncCommand {
    name: String,
    handle: JoinHandle<Result<(), StepError>>,
}

impl AsyncCommand {
    pub(crate) fn spawn<F>(name: &str, future: F) -> Self
    where
        F: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            handle: tokio::spawn(future),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the command. A later [`wait`](AsyncCommand::wait) reports
    /// [`StepError::Canceled`].
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the command to finish.
    ///
    /// An aborted task is reported as cancelled, a panicked one as failed.
    pub async fn wait(mut self) -> Result<(), StepError> {
        let joined = (&mut self.handle).await;
        self.finish(joined)
    }

    fn finish(&self, joined: std::result::Result<Result<(), StepError>, JoinError>) -> Result<(), StepError> {
        match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(StepError::Canceled),
            Err(err) => Err(StepError::Failed(anyhow!(
                "Async command '{}' panicked: {}",
                self.name,
                err
            ))),
        }
    }
}
