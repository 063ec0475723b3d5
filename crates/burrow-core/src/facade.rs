//! The externally visible parent connection.
//!
//! A [`FacadeChannel`] has no I/O of its own. Its lifecycle is synthesized by
//! [`ServerChannelHandler`](crate::ServerChannelHandler) from the real
//! transport channel underneath, so observers see bound/unbound/closed exactly
//! as they would on a plain listening socket.

use std::net::SocketAddr;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{ChannelId, FacadeEvent};

/// Lifecycle state of a facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeState {
    /// No lifecycle event has been relayed yet.
    Unopened,
    Bound(SocketAddr),
    Unbound,
    /// Terminal.
    Closed,
}

/// Parent facade connection.
pub struct FacadeChannel {
    id: ChannelId,
    /// State and event sender share one lock so state changes and emitted
    /// events are observed in the same order.
    inner: Mutex<FacadeInner>,
}

struct FacadeInner {
    state: FacadeState,
    events: mpsc::UnboundedSender<FacadeEvent>,
}

/// Receiving side of a facade's lifecycle events, for downstream dispatch.
#[derive(Debug)]
pub struct FacadeEvents {
    rx: mpsc::UnboundedReceiver<FacadeEvent>,
}

impl FacadeChannel {
    /// Create a facade and the receiver its lifecycle events are emitted on.
    pub fn new(id: ChannelId) -> (Self, FacadeEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let facade = Self {
            id,
            inner: Mutex::new(FacadeInner {
                state: FacadeState::Unopened,
                events: tx,
            }),
        };
        (facade, FacadeEvents { rx })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> FacadeState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() != FacadeState::Closed
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state(), FacadeState::Bound(_))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.state() {
            FacadeState::Bound(addr) => Some(addr),
            _ => None,
        }
    }

    /// Apply `event` to the facade state and emit it.
    ///
    /// Returns `false` (and emits nothing) once the facade is closed.
    pub fn fire(&self, event: FacadeEvent) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == FacadeState::Closed {
            tracing::warn!(facade = %self.id, ?event, "facade already closed; dropping event");
            return false;
        }

        inner.state = match event {
            FacadeEvent::Bound(addr) => FacadeState::Bound(addr),
            FacadeEvent::Unbound => FacadeState::Unbound,
            FacadeEvent::Closed => FacadeState::Closed,
        };
        tracing::debug!(facade = %self.id, ?event, "facade event");

        // Nobody listening downstream is fine; the state still advances.
        let _ = inner.events.send(event);
        true
    }
}

impl std::fmt::Debug for FacadeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacadeChannel")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl FacadeEvents {
    /// Wait for the next event. `None` once the facade is dropped and all
    /// events have been received.
    pub async fn recv(&mut self) -> Option<FacadeEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<FacadeEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every event queued so far.
    pub fn drain(&mut self) -> Vec<FacadeEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
