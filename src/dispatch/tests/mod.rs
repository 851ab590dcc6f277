//! Dispatch test suites
//!
//! Fan-out tests record into a per-thread trace so that hooks, observers and
//! plain function handlers all land in one ordered list.


use crate::context::Context;
use crate::dispatch::{Observer, ObserverResult};
use crate::registry::ChannelId;
use std::cell::RefCell;

thread_local! {
    static TRACE: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub(super) fn trace(entry: String) {
    TRACE.with(|t| t.borrow_mut().push(entry));
}

/// Take everything traced so far on this thread.
pub(super) fn take_trace() -> Vec<String> {
    TRACE.with(|t| std::mem::take(&mut *t.borrow_mut()))
}

/// Observer that traces `label:kind:flag` and then runs an optional action.
pub(super) struct Tracer {
    label: &'static str,
    on_update: Option<Box<dyn FnMut(&mut Context, ChannelId) -> ObserverResult>>,
}

impl Tracer {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            on_update: None,
        }
    }

    pub fn on_update(
        label: &'static str,
        action: impl FnMut(&mut Context, ChannelId) -> ObserverResult + 'static,
    ) -> Self {
        Self {
            label,
            on_update: Some(Box::new(action)),
        }
    }
}

impl Observer for Tracer {
    fn on_connection(&mut self, _cx: &mut Context, _channel: ChannelId, up: bool) -> ObserverResult {
        trace(format!("{}:connection:{}", self.label, up));
        Ok(())
    }

    fn on_update(&mut self, cx: &mut Context, channel: ChannelId, first: bool) -> ObserverResult {
        trace(format!("{}:update:{}", self.label, first));
        match self.on_update.as_mut() {
            Some(action) => action(cx, channel),
            None => Ok(()),
        }
    }

    fn on_write_ack(&mut self, _cx: &mut Context, _channel: ChannelId, ok: bool) -> ObserverResult {
        trace(format!("{}:write-ack:{}", self.label, ok));
        Ok(())
    }
}

pub(super) fn update_handler(_cx: &mut Context, _channel: ChannelId, first: bool) -> ObserverResult {
    trace(format!("handler:update:{}", first));
    Ok(())
}

pub(super) fn connection_handler(
    _cx: &mut Context,
    _channel: ChannelId,
    up: bool,
) -> ObserverResult {
    trace(format!("handler:connection:{}", up));
    Ok(())
}
