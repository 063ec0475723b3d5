//! In-memory real channels: listeners and the children they accept.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use burrow_core::{
    Channel, ChannelId, CloseCallback, PipelineError, PipelineFactory, SaturationStateChange,
    Watermarks,
};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{OutboundQueue, TransportError};

/// What a [`MemChannel`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Listener,
    Child { parent: ChannelId },
}

/// A real in-memory channel.
pub struct MemChannel {
    id: ChannelId,
    role: ChannelRole,
    local_addr: Mutex<Option<SocketAddr>>,
    open: watch::Sender<bool>,
    pipeline: Mutex<Option<Arc<dyn PipelineFactory>>>,
    close_callbacks: Mutex<Vec<CloseCallback>>,
    outbound: OutboundQueue,
}

impl MemChannel {
    pub(crate) fn listener(id: ChannelId, watermarks: Watermarks) -> Self {
        Self::new(id, ChannelRole::Listener, None, watermarks)
    }

    pub(crate) fn child(
        id: ChannelId,
        parent: ChannelId,
        addr: SocketAddr,
        watermarks: Watermarks,
    ) -> Self {
        Self::new(id, ChannelRole::Child { parent }, Some(addr), watermarks)
    }

    fn new(
        id: ChannelId,
        role: ChannelRole,
        local_addr: Option<SocketAddr>,
        watermarks: Watermarks,
    ) -> Self {
        let (open, _) = watch::channel(true);
        Self {
            id,
            role,
            local_addr: Mutex::new(local_addr),
            open,
            pipeline: Mutex::new(None),
            close_callbacks: Mutex::new(Vec::new()),
            outbound: OutboundQueue::new(watermarks),
        }
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Resolves once the channel has closed.
    pub async fn closed(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives as long as `self`, so this only ends on close.
        let _ = rx.wait_for(|open| !*open).await;
    }

    /// The pipeline factory installed on this channel, if any.
    pub fn pipeline(&self) -> Option<Arc<dyn PipelineFactory>> {
        self.pipeline.lock().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.pipeline.lock().is_some()
    }

    /// Queue `bytes` for the peer.
    pub fn write(&self, bytes: Bytes) -> Result<SaturationStateChange, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        Ok(self.outbound.push(bytes))
    }

    /// Take the oldest pending outbound chunk, as the peer would on read.
    pub fn take_outbound(&self) -> Option<Bytes> {
        self.outbound.pop()
    }

    pub fn is_writable(&self) -> bool {
        self.outbound.is_writable()
    }

    pub fn writability(&self) -> watch::Receiver<bool> {
        self.outbound.writability()
    }

    pub fn set_watermarks(&self, watermarks: Watermarks) {
        self.outbound.set_watermarks(watermarks);
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    pub(crate) fn set_local_addr(&self, addr: Option<SocketAddr>) -> Option<SocketAddr> {
        std::mem::replace(&mut *self.local_addr.lock(), addr)
    }
}

impl Channel for MemChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    fn close(&self) {
        let changed = self.open.send_if_modified(|open| std::mem::replace(open, false));
        if !changed {
            return;
        }
        tracing::debug!(channel = %self.id, role = ?self.role, "channel closed");

        let callbacks = std::mem::take(&mut *self.close_callbacks.lock());
        for callback in callbacks {
            callback(self.id);
        }
    }

    fn install_pipeline(&self, factory: Arc<dyn PipelineFactory>) -> Result<(), PipelineError> {
        if !self.is_open() {
            return Err(PipelineError::ChannelClosed(self.id));
        }
        if self.is_configured() {
            return Err(PipelineError::AlreadyConfigured(self.id));
        }

        // Not holding the slot while user code runs.
        factory.configure(self)?;

        let mut slot = self.pipeline.lock();
        if slot.is_some() {
            return Err(PipelineError::AlreadyConfigured(self.id));
        }
        *slot = Some(factory);
        Ok(())
    }

    fn on_close(&self, callback: CloseCallback) {
        let mut callbacks = self.close_callbacks.lock();
        // Checked under the lock `close` takes after flipping the flag.
        if self.is_open() {
            callbacks.push(callback);
            return;
        }
        drop(callbacks);
        callback(self.id);
    }
}

impl std::fmt::Debug for MemChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemChannel")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("open", &self.is_open())
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}
