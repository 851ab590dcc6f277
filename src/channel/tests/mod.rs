//! Channel test suites
//!
//! [`Harness`] drives one channel against the simulated service without a
//! context: notifications are drained and applied directly.


use crate::channel::{Channel, Link, TokenSource};
use crate::core::config::DEFAULT_MAX_ARRAY_BYTES;
use crate::dispatch::ChannelEvent;
use crate::queue::{Notification, NotificationQueue};
use crate::registry::{ChannelId, SlotKey};
use crate::service::{ChannelService, SimVariable, SimulatedControl, SimulatedService};

pub(super) const CONTEXT: u64 = 7;

pub(super) struct Harness {
    pub service: SimulatedService,
    pub control: SimulatedControl,
    pub queue: NotificationQueue,
    pub tokens: TokenSource,
    pub channel: Channel,
    pub max_array_bytes: usize,
}

impl Harness {
    pub fn new(name: &str, variable: SimVariable) -> Self {
        let (mut service, control) = SimulatedService::new();
        let queue = NotificationQueue::new(1000);
        queue.initialise();
        service.attach(queue.sender()).unwrap();
        control.define(name, variable);
        Self {
            service,
            control,
            queue,
            tokens: TokenSource::default(),
            channel: Channel::new(ChannelId::from_parts(0, 0), CONTEXT, name),
            max_array_bytes: DEFAULT_MAX_ARRAY_BYTES,
        }
    }

    pub fn with_link<R>(&mut self, f: impl FnOnce(&mut Channel, &mut Link<'_>) -> R) -> R {
        let mut link = Link {
            service: &mut self.service,
            tokens: &mut self.tokens,
            max_array_bytes: self.max_array_bytes,
        };
        f(&mut self.channel, &mut link)
    }

    pub fn open(&mut self) -> bool {
        self.with_link(|channel, link| channel.open(link))
    }

    pub fn close(&mut self) -> Option<ChannelEvent> {
        self.with_link(|channel, link| channel.close(link))
    }

    /// Apply everything queued for this channel, returning the events it
    /// produced.
    pub fn pump(&mut self) -> Vec<ChannelEvent> {
        let mut items = Vec::new();
        self.queue.drain(usize::MAX, |item| items.push(item));

        let mut events = Vec::new();
        for item in items {
            if item.handle().is_none() || item.handle() != self.channel.handle() {
                continue;
            }
            let event = match item {
                Notification::Connection(connection) => self
                    .with_link(|channel, link| channel.on_connection(link, connection.is_up)),
                Notification::Update(update) => self.channel.on_update(update),
                Notification::Diagnostic(_) => None,
            };
            events.extend(event);
        }
        events
    }

    /// Open, connect and complete the initial read.
    pub fn connect(&mut self) -> Vec<ChannelEvent> {
        assert!(self.open());
        self.control.connect(self.channel.name());
        let mut events = self.pump();
        self.control.complete_gets();
        events.extend(self.pump());
        events
    }
}

pub(super) fn doubles(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}
