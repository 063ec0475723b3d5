//! Lifecycle events.

use std::fmt;
use std::net::SocketAddr;

use crate::ChannelRef;

/// Lifecycle notification raised by a real transport channel.
///
/// The substrate delivers these in order, one at a time per channel.
pub enum ChannelEvent {
    /// The channel exists and needs its pipeline before anything else.
    Opened,
    /// The channel is bound to a local address.
    Bound(SocketAddr),
    /// The channel released its local address.
    Unbound,
    /// The channel finished closing. No further events follow.
    Closed,
    /// The channel accepted a new child connection.
    ChildAccepted(ChannelRef),
}

impl ChannelEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Bound(_) => "bound",
            Self::Unbound => "unbound",
            Self::Closed => "closed",
            Self::ChildAccepted(_) => "child-accepted",
        }
    }
}

impl fmt::Debug for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => f.write_str("Opened"),
            Self::Bound(addr) => f.debug_tuple("Bound").field(addr).finish(),
            Self::Unbound => f.write_str("Unbound"),
            Self::Closed => f.write_str("Closed"),
            Self::ChildAccepted(child) => {
                f.debug_tuple("ChildAccepted").field(&child.id()).finish()
            }
        }
    }
}

/// Lifecycle notification emitted on a [`FacadeChannel`](crate::FacadeChannel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeEvent {
    Bound(SocketAddr),
    Unbound,
    Closed,
}
