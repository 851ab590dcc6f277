//! Observer capability set and per-channel handlers

use crate::context::Context;
use crate::registry::ChannelId;
use std::collections::BTreeSet;

/// Outcome of one observer or handler call. Errors are reported through the
/// diagnostic sink; they never stop the remaining deliveries.
pub type ObserverResult = Result<(), Box<dyn std::error::Error>>;

/// Receives notifications about channels.
///
/// Used both as a channel's own hook and as a registered observer. Every
/// method defaults to doing nothing. The context is lent to each call, so an
/// observer may read channels, write to them, register or deregister, or
/// destroy channels while handling an event.
pub trait Observer {
    fn on_connection(
        &mut self,
        _cx: &mut Context,
        _channel: ChannelId,
        _is_connected: bool,
    ) -> ObserverResult {
        Ok(())
    }

    fn on_update(&mut self, _cx: &mut Context, _channel: ChannelId, _first: bool) -> ObserverResult {
        Ok(())
    }

    fn on_write_ack(
        &mut self,
        _cx: &mut Context,
        _channel: ChannelId,
        _success: bool,
    ) -> ObserverResult {
        Ok(())
    }
}

/// Plain function called last for one kind of event.
pub type HandlerFn = fn(&mut Context, ChannelId, bool) -> ObserverResult;

/// Optional function handlers of one channel, one per event kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Handlers {
    pub connection: Option<HandlerFn>,
    pub update: Option<HandlerFn>,
    pub write_ack: Option<HandlerFn>,
}

impl Handlers {
    pub(crate) fn for_event(&self, event: ChannelEvent) -> Option<HandlerFn> {
        match event {
            ChannelEvent::Connection(_) => self.connection,
            ChannelEvent::Update { .. } => self.update,
            ChannelEvent::WriteAck(_) => self.write_ack,
        }
    }
}

/// A change observers are told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Connectivity flipped.
    Connection(bool),
    /// New data arrived; `first` is set for the first update after a connect.
    Update { first: bool },
    /// An acknowledged write completed, successfully or not.
    WriteAck(bool),
}

impl ChannelEvent {
    pub fn kind(self) -> &'static str {
        match self {
            ChannelEvent::Connection(_) => "connection",
            ChannelEvent::Update { .. } => "update",
            ChannelEvent::WriteAck(_) => "write-ack",
        }
    }

    pub(crate) fn deliver(
        self,
        observer: &mut dyn Observer,
        cx: &mut Context,
        channel: ChannelId,
    ) -> ObserverResult {
        match self {
            ChannelEvent::Connection(up) => observer.on_connection(cx, channel, up),
            ChannelEvent::Update { first } => observer.on_update(cx, channel, first),
            ChannelEvent::WriteAck(success) => observer.on_write_ack(cx, channel, success),
        }
    }

    pub(crate) fn flag(self) -> bool {
        match self {
            ChannelEvent::Connection(flag) | ChannelEvent::WriteAck(flag) => flag,
            ChannelEvent::Update { first } => first,
        }
    }
}

/// A registered observer and the channels it is registered with.
///
/// `observer` is `None` while the observer is executing.
pub(crate) struct ObserverEntry {
    pub(crate) observer: Option<Box<dyn Observer>>,
    pub(crate) channels: BTreeSet<ChannelId>,
}

impl ObserverEntry {
    pub(crate) fn new(observer: Box<dyn Observer>) -> Self {
        Self {
            observer: Some(observer),
            channels: BTreeSet::new(),
        }
    }
}
