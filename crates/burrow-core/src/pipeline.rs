//! Pipeline configuration capability.

use crate::{Channel, PipelineError};

/// Installs the processing stages a new real channel needs.
///
/// Called once per real channel (the listener when it opens, every child
/// when it is accepted) before any further event is delivered on it. An
/// error aborts that channel's initialization.
///
/// Any `Fn(&dyn Channel) -> Result<(), PipelineError>` closure is a factory:
///
/// ```
/// use std::sync::Arc;
/// use burrow_core::{Channel, PipelineError, PipelineFactory};
///
/// let factory: Arc<dyn PipelineFactory> = Arc::new(|channel: &dyn Channel| {
///     tracing::debug!(channel = %channel.id(), "installing tunnel codec");
///     Ok::<_, PipelineError>(())
/// });
/// # let _ = factory;
/// ```
pub trait PipelineFactory: Send + Sync + 'static {
    fn configure(&self, channel: &dyn Channel) -> Result<(), PipelineError>;
}

impl<F> PipelineFactory for F
where
    F: Fn(&dyn Channel) -> Result<(), PipelineError> + Send + Sync + 'static,
{
    fn configure(&self, channel: &dyn Channel) -> Result<(), PipelineError> {
        self(channel)
    }
}
