//! Lifecycle relay from the real listener channel to its facade.

use std::sync::Arc;

use crate::{
    Channel, ChannelEvent, ChannelGroup, FacadeChannel, FacadeEvent, PipelineError,
    PipelineFactory,
};

/// Receives lifecycle events from a real transport channel.
///
/// The substrate calls this sequentially per channel, in the channel's own
/// event order. On `Err` the substrate must stop delivering events on that
/// channel.
pub trait ChannelHandler: Send + Sync + 'static {
    fn handle_event(
        &self,
        channel: &dyn Channel,
        event: ChannelEvent,
    ) -> Result<(), PipelineError>;
}

/// Coordinates a server's facade with the real channel underneath it.
///
/// | real channel event | effect |
/// |---|---|
/// | `Opened` | install the pipeline factory on the channel |
/// | `Bound(addr)` | facade fires `Bound(addr)` |
/// | `Unbound` | facade fires `Unbound` |
/// | `Closed` | facade fires `Closed` |
/// | `ChildAccepted(child)` | child joins the group; facade stays quiet |
///
/// The handler is a pure observer: it never binds or closes anything itself.
pub struct ServerChannelHandler {
    facade: Arc<FacadeChannel>,
    pipeline: Arc<dyn PipelineFactory>,
    group: Arc<ChannelGroup>,
}

impl ServerChannelHandler {
    pub fn new(
        facade: Arc<FacadeChannel>,
        pipeline: Arc<dyn PipelineFactory>,
        group: Arc<ChannelGroup>,
    ) -> Self {
        Self {
            facade,
            pipeline,
            group,
        }
    }
}

impl ChannelHandler for ServerChannelHandler {
    fn handle_event(
        &self,
        channel: &dyn Channel,
        event: ChannelEvent,
    ) -> Result<(), PipelineError> {
        tracing::trace!(
            channel = %channel.id(),
            facade = %self.facade.id(),
            event = event.kind(),
            "server channel event"
        );

        match event {
            ChannelEvent::Opened => {
                if let Err(error) = channel.install_pipeline(Arc::clone(&self.pipeline)) {
                    tracing::error!(
                        channel = %channel.id(),
                        %error,
                        "pipeline configuration failed"
                    );
                    return Err(error);
                }
            }
            ChannelEvent::Bound(addr) => {
                self.facade.fire(FacadeEvent::Bound(addr));
            }
            ChannelEvent::Unbound => {
                self.facade.fire(FacadeEvent::Unbound);
            }
            ChannelEvent::Closed => {
                self.facade.fire(FacadeEvent::Closed);
            }
            ChannelEvent::ChildAccepted(child) => {
                let child_id = child.id();
                let added = self.group.add(child);
                tracing::debug!(
                    parent = %channel.id(),
                    child = %child_id,
                    added,
                    "child accepted"
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerChannelHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerChannelHandler")
            .field("facade", &self.facade)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}
