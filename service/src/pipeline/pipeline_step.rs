use crate::error::Error;

/// The action to take after a step completes.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Continue to the next step
    Continue,
    /// Skip all remaining steps (successful early exit)
    Skip,
    /// Abort the pipeline with an error
    Abort(Error),
}

/// A single stage of a pipeline.
///
/// Steps read dependencies from the context, store their results back into
/// it and tell the pipeline how to proceed.
///
/// # Example
///
/// ```ignore
/// struct ValidateSettingsStep;
///
/// #[async_trait::async_trait]
/// impl PipelineStep<DeletionContext> for ValidateSettingsStep {
///     fn name(&self) -> &'static str {
///         "validate_settings"
///     }
///
///     async fn execute(&self, context: &mut DeletionContext) -> StepAction {
///         match context.settings.validate() {
///             Ok(()) => StepAction::Continue,
///             Err(e) => StepAction::Abort(e),
///         }
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait PipelineStep<T>: Send + Sync {
    /// Returns the name of this step for logging.
    fn name(&self) -> &'static str;

    /// Steps returning `false` are skipped without affecting the pipeline flow.
    fn should_execute(&self, _context: &T) -> bool {
        true
    }

    async fn execute(&self, context: &mut T) -> StepAction;
}
