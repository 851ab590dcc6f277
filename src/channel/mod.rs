//! Channel state machine and payload cache
//!
//! A [`Channel`] moves through `Unused → Pending → Connected ⇄ Disconnected`
//! and back to `Unused` when closed. Transitions are driven by the owning
//! context, which lends the channel a [`Link`] to the service for the
//! duration of each call. Transitions that observers must hear about return
//! a [`ChannelEvent`](crate::dispatch::ChannelEvent) for the context to
//! dispatch.

mod decode;
mod payload;
mod state;
mod write;

pub use decode::format_floating;
pub use payload::{PayloadBuffer, INLINE_CAPACITY};
pub use state::{
    Channel, ChannelOptions, ConnectionState, MAX_ENUM_STATES, MAX_ENUM_STRING_SIZE, MAX_NAME_LEN,
};

use crate::queue::RequestToken;
use crate::service::ChannelService;

/// Issues request tokens unique within one context.
#[derive(Debug, Default)]
pub(crate) struct TokenSource {
    last: u64,
}

impl TokenSource {
    pub(crate) fn mint(&mut self) -> RequestToken {
        self.last += 1;
        RequestToken(self.last)
    }
}

/// What a channel may use while handling one call.
pub(crate) struct Link<'a> {
    pub(crate) service: &'a mut dyn ChannelService,
    pub(crate) tokens: &'a mut TokenSource,
    pub(crate) max_array_bytes: usize,
}

#[cfg(test)]
mod tests;
