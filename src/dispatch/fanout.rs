//! Delivery of one channel event to everything listening

use crate::context::Context;
use crate::dispatch::observer::{ChannelEvent, ObserverResult};
use crate::registry::{ChannelId, ObserverId};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Deliver `event` to the channel's hook, then to a snapshot of its
/// registered observers, then to its function handler.
///
/// Each call is isolated: an error or panic is reported and delivery moves
/// on. An observer that is already executing further up the stack is
/// skipped. Delivery stops once the channel has been destroyed.
pub(crate) fn dispatch(cx: &mut Context, channel: ChannelId, event: ChannelEvent) {
    log::trace!("Dispatching {:?} for channel {}", event, channel);

    let hook = match cx.channels.get_mut(channel) {
        Some(state) => state.hook.take(),
        None => return,
    };
    if let Some(mut hook) = hook {
        guarded(event, channel, "hook", || event.deliver(hook.as_mut(), cx, channel));
        match cx.channels.get_mut(channel) {
            // A hook installed during the call takes precedence.
            Some(state) if state.hook.is_none() => state.hook = Some(hook),
            Some(_) => {}
            None => return,
        }
    }

    let snapshot: Vec<ObserverId> = match cx.channels.get(channel) {
        Some(state) => state.observers.iter().copied().collect(),
        None => return,
    };
    for id in snapshot {
        let Some(state) = cx.channels.get(channel) else {
            return;
        };
        if !state.observers.contains(&id) {
            continue;
        }
        let Some(mut observer) = cx.observers.get_mut(id).and_then(|e| e.observer.take()) else {
            log::debug!("Observer {} busy, skipping {} for {}", id, event.kind(), channel);
            continue;
        };
        guarded(event, channel, "observer", || {
            event.deliver(observer.as_mut(), cx, channel)
        });
        if let Some(entry) = cx.observers.get_mut(id) {
            entry.observer = Some(observer);
        }
    }

    let handler = match cx.channels.get(channel) {
        Some(state) => state.handlers.for_event(event),
        None => return,
    };
    if let Some(handler) = handler {
        guarded(event, channel, "handler", || handler(cx, channel, event.flag()));
    }
}

fn guarded(
    event: ChannelEvent,
    channel: ChannelId,
    role: &str,
    call: impl FnOnce() -> ObserverResult,
) {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            crate::report_error!("{} {} for channel {} failed: {}", event.kind(), role, channel, e);
        }
        Err(payload) => {
            crate::report_error!(
                "{} {} for channel {} panicked: {}",
                event.kind(),
                role,
                channel,
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "unknown panic"
    }
}
