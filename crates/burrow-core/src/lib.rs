//! burrow-core: flow control and lifecycle relay for tunneled transports.
//!
//! A tunneled server multiplexes many logical connections over one real
//! transport channel, but its users expect a conventional connection
//! lifecycle. This crate provides the pieces that bridge the two:
//!
//! - [`SaturationManager`]: turns signed queue-size deltas into exactly-once
//!   [`SaturationStateChange`] notifications around a pair of [`Watermarks`]
//! - [`ChannelGroup`]: thread-safe set of live channels for bulk shutdown
//! - [`ServerChannelHandler`]: relays lifecycle events from the real channel
//!   to a [`FacadeChannel`] and registers accepted children in a group
//! - Capability traits ([`Channel`], [`ChannelHandler`], [`PipelineFactory`])
//!   the surrounding transport plugs into
//! - [`TunnelConfig`] and [`PipelineError`]
//!
//! Nothing here spawns tasks, blocks, or performs I/O.

#![forbid(unsafe_code)]

mod channel;
mod config;
mod error;
mod event;
mod facade;
mod group;
mod handler;
mod pipeline;
mod saturation;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use facade::*;
pub use group::*;
pub use handler::*;
pub use pipeline::*;
pub use saturation::*;

#[cfg(test)]
mod proptests;
