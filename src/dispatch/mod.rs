//! Event fan-out to hooks, observers and function handlers
//!
//! Every channel event reaches up to three kinds of listener, always in this
//! order:
//!
//! 1. the channel's own hook, set with
//!    [`Context::set_hook`](crate::context::Context::set_hook)
//! 2. each registered [`Observer`], from a snapshot taken before the first
//!    call so registrations made during delivery take effect next time
//! 3. the channel's [`Handlers`] function for the event kind
//!
//! Registration is symmetric: a channel knows its observers and an observer
//! knows its channels, and both sides are always updated together.
//! [`ChannelSet`] groups channels for bulk registration, opening and
//! readiness checks.

mod fanout;
mod observer;
mod set;

pub use observer::{ChannelEvent, HandlerFn, Handlers, Observer, ObserverResult};
pub use set::{ChannelSet, MIN_POLL_INTERVAL};

pub(crate) use fanout::dispatch;
pub(crate) use observer::ObserverEntry;
pub(crate) use set::is_ready;

#[cfg(test)]
mod tests;
