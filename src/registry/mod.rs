//! Channel and observer identity
//!
//! Channels and observers live in generation-counted slot maps. Every
//! notification coming back from the service carries the [`ChannelTag`]
//! given at creation, and [`resolve`] accepts it only if the tag names a
//! live channel of this context whose stored handle equals the incoming one.

pub mod slots;
pub mod validate;

pub use slots::{ChannelId, ObserverId, SlotKey, SlotMap};
pub use validate::{resolve, ChannelTag, ForeignHandle, Rejection};
