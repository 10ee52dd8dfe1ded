//! Job extension steps.
//!
//! A job extension contributes a prepare step at the start of the job and
//! a cleanup step at the end.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::StepContext;
use crate::error::StepError;

/// Which half of an extension a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionStage {
    Prepare,
    Cleanup,
}

/// Built-in job-level behavior wrapped around the user's steps.
#[async_trait]
pub trait JobExtension: Send + Sync {
    fn name(&self) -> &str;

    async fn prepare(&self, ctx: Arc<StepContext>) -> Result<(), StepError>;

    async fn cleanup(&self, _ctx: Arc<StepContext>) -> Result<(), StepError> {
        Ok(())
    }
}

/// A step that runs one stage of a [`JobExtension`].
#[derive(Clone)]
pub struct ExtensionStep {
    pub stage: ExtensionStage,
    pub extension: Arc<dyn JobExtension>,
}

impl ExtensionStep {
    pub fn prepare(extension: Arc<dyn JobExtension>) -> Self {
        Self {
            stage: ExtensionStage::Prepare,
            extension,
        }
    }

    pub fn cleanup(extension: Arc<dyn JobExtension>) -> Self {
        Self {
            stage: ExtensionStage::Cleanup,
            extension,
        }
    }

    pub(crate) async fn run(&self, ctx: Arc<StepContext>) -> Result<(), StepError> {
        match self.stage {
            ExtensionStage::Prepare => self.extension.prepare(ctx).await,
            ExtensionStage::Cleanup => self.extension.cleanup(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use crate::secrets::NoopMasker;
    use crate::variables::VariableStore;

    struct Marker;

    #[async_trait]
    impl JobExtension for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        async fn prepare(&self, ctx: Arc<StepContext>) -> Result<(), StepError> {
            ctx.variables().set("prepared", "true", false)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stages_dispatch_to_extension() {
        let job = JobContext::new(Arc::new(VariableStore::empty(Arc::new(NoopMasker))));
        let extension: Arc<dyn JobExtension> = Arc::new(Marker);

        ExtensionStep::prepare(Arc::clone(&extension))
            .run(job.create_step_context("Prepare"))
            .await
            .unwrap();
        ExtensionStep::cleanup(extension)
            .run(job.create_step_context("Cleanup"))
            .await
            .unwrap();

        assert_eq!(job.variables().get_bool("prepared"), Some(true));
    }
}
