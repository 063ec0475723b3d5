//! Channel identity and the real-channel capability trait.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{PipelineError, PipelineFactory};

/// Identity of a channel (real or facade).
///
/// Two handles refer to the same channel iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates channel ids for one server.
///
/// Each bound endpoint owns an allocator; ids are unique within it.
#[derive(Debug)]
pub struct ChannelIds {
    next: AtomicU32,
}

impl ChannelIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Get the next channel id.
    pub fn next_id(&self) -> ChannelId {
        ChannelId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ChannelIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A real transport channel: a listener, or a child accepted through one.
///
/// Implemented by the transport that carries the tunnel. The core only ever
/// observes channels and installs pipelines on them; it never binds or closes
/// them on its own initiative.
pub trait Channel: Send + Sync + 'static {
    fn id(&self) -> ChannelId;

    /// True until the channel has finished closing.
    fn is_open(&self) -> bool;

    /// The bound local address, if any.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Request close. Non-blocking; completion is observed through the
    /// channel's own lifecycle events.
    fn close(&self);

    /// Configure this channel with `factory` and keep it for any children the
    /// channel accepts.
    fn install_pipeline(&self, factory: Arc<dyn PipelineFactory>) -> Result<(), PipelineError>;

    /// Run `callback` once this channel has finished closing.
    ///
    /// Runs it immediately, on the caller's thread, if the channel is
    /// already closed.
    fn on_close(&self, callback: CloseCallback);
}

/// Shared handle to a real channel.
pub type ChannelRef = Arc<dyn Channel>;

/// Close notification registered through [`Channel::on_close`].
pub type CloseCallback = Box<dyn FnOnce(ChannelId) + Send + 'static>;
