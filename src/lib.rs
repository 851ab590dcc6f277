//! Client-side runtime for a remote process-variable protocol.
//!
//! The crate sits between a channel service library, which calls back on its
//! own threads, and an application that wants to handle every change on one
//! thread of its choosing:
//!
//! - [`queue`] carries notifications from the service threads to the owner,
//!   coalescing superseded updates under load
//! - [`channel`] holds the per-channel state machine and value cache
//! - [`dispatch`] fans each change out to hooks, observers and handlers
//! - [`registry`] validates that a late callback still refers to a live
//!   channel
//! - [`context`] ties them together behind [`context::Context::poll`]
//!
//! [`service::SimulatedService`] stands in for the real service library in
//! tests and demos.

pub mod channel;
pub mod context;
pub mod core;
pub mod dispatch;
pub mod queue;
pub mod registry;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use channel::{Channel, ChannelOptions, ConnectionState};
pub use context::{Context, ContextError};
pub use dispatch::{ChannelEvent, ChannelSet, Handlers, Observer, ObserverResult};
pub use registry::{ChannelId, ObserverId};
