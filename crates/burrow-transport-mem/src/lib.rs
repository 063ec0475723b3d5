//! burrow-transport-mem: in-process reference transport for burrow.
//!
//! Stands in for a real network substrate so the coordination pieces in
//! `burrow-core` can be exercised end to end:
//!
//! - [`MemServer`] owns a listener channel, delivers its lifecycle events to a
//!   [`ChannelHandler`](burrow_core::ChannelHandler) in order from a driver
//!   task, and accepts children
//! - [`MemChannel`] is a listener or accepted child with an [`OutboundQueue`]
//!   whose writability follows the saturation latch
//!
//! # Usage
//!
//! ```ignore
//! let server = MemServer::bind(addr, handler, Arc::new(ChannelIds::new()), config)?;
//! let child = server.accept()?;
//! child.write(Bytes::from_static(b"hello"))?;
//! ```

#![forbid(unsafe_code)]

mod channel;
mod error;
mod queue;
mod server;

pub use channel::*;
pub use error::*;
pub use queue::*;
pub use server::*;
