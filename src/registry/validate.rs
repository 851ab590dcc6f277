//! Resolution of incoming foreign handles to live channels

use super::slots::{ChannelId, SlotMap};

/// Opaque identifier the service uses for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForeignHandle(pub u64);

impl std::fmt::Display for ForeignHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity handed to the service when a channel is created and echoed back
/// with every notification about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelTag {
    pub context: u64,
    pub channel: ChannelId,
}

/// Why an incoming notification was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingTag,
    ForeignContext { expected: u64, found: u64 },
    /// The channel was destroyed, possibly with its slot reused since.
    StaleChannel,
    /// The channel exists but is closed.
    NotOpen,
    HandleMismatch {
        stored: ForeignHandle,
        incoming: ForeignHandle,
    },
}

/// Recover the channel an event refers to.
///
/// `stored_handle` reads the handle a channel currently holds. Rejections are
/// expected races and are logged at trace level only.
pub fn resolve<V>(
    channels: &SlotMap<ChannelId, V>,
    context: u64,
    tag: Option<ChannelTag>,
    incoming: ForeignHandle,
    stored_handle: impl Fn(&V) -> Option<ForeignHandle>,
) -> Result<ChannelId, Rejection> {
    let outcome = check(channels, context, tag, incoming, stored_handle);
    if let Err(rejection) = &outcome {
        log::trace!("Discarding event for handle {}: {:?}", incoming, rejection);
    }
    outcome
}

fn check<V>(
    channels: &SlotMap<ChannelId, V>,
    context: u64,
    tag: Option<ChannelTag>,
    incoming: ForeignHandle,
    stored_handle: impl Fn(&V) -> Option<ForeignHandle>,
) -> Result<ChannelId, Rejection> {
    let tag = tag.ok_or(Rejection::MissingTag)?;
    if tag.context != context {
        return Err(Rejection::ForeignContext {
            expected: context,
            found: tag.context,
        });
    }
    let channel = channels.get(tag.channel).ok_or(Rejection::StaleChannel)?;
    let stored = stored_handle(channel).ok_or(Rejection::NotOpen)?;
    if stored != incoming {
        return Err(Rejection::HandleMismatch { stored, incoming });
    }
    Ok(tag.channel)
}
