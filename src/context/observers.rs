use super::Context;
use crate::dispatch::{is_ready, ChannelSet, Observer, ObserverEntry, MIN_POLL_INTERVAL};
use crate::registry::{ChannelId, ObserverId};
use std::time::{Duration, Instant};

impl Context {
    pub fn add_observer(&mut self, observer: impl Observer + 'static) -> ObserverId {
        self.add_boxed_observer(Box::new(observer))
    }

    pub fn add_boxed_observer(&mut self, observer: Box<dyn Observer>) -> ObserverId {
        let id = self.observers.insert(ObserverEntry::new(observer));
        log::debug!("Added observer {}", id);
        id
    }

    /// Deregister the observer from every channel and hand it back.
    ///
    /// Returns `None` for an unknown observer, and also when called from
    /// inside the observer's own callback; it is dropped once that
    /// callback returns.
    pub fn remove_observer(&mut self, id: ObserverId) -> Option<Box<dyn Observer>> {
        let entry = self.observers.remove(id)?;
        for channel in entry.channels {
            if let Some(state) = self.channels.get_mut(channel) {
                state.observers.remove(&id);
            }
        }
        log::debug!("Removed observer {}", id);
        entry.observer
    }

    pub fn contains_observer(&self, id: ObserverId) -> bool {
        self.observers.contains(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Register `observer` with `channel`. False if either is unknown or it
    /// was already registered.
    pub fn register(&mut self, observer: ObserverId, channel: ChannelId) -> bool {
        if !self.channels.contains(channel) {
            return false;
        }
        let Some(entry) = self.observers.get_mut(observer) else {
            return false;
        };
        if !entry.channels.insert(channel) {
            return false;
        }
        if let Some(state) = self.channels.get_mut(channel) {
            state.observers.insert(observer);
        }
        true
    }

    /// Undo [`register`](Self::register). False if it was not registered.
    pub fn deregister(&mut self, observer: ObserverId, channel: ChannelId) -> bool {
        let removed = self
            .observers
            .get_mut(observer)
            .is_some_and(|entry| entry.channels.remove(&channel));
        if let Some(state) = self.channels.get_mut(channel) {
            state.observers.remove(&observer);
        }
        removed
    }

    pub fn register_set(&mut self, observer: ObserverId, set: &ChannelSet) {
        set.register_all(self, observer);
    }

    pub fn deregister_set(&mut self, observer: ObserverId, set: &ChannelSet) {
        set.deregister_all(self, observer);
    }

    pub fn is_registered(&self, observer: ObserverId, channel: ChannelId) -> bool {
        self.observers
            .get(observer)
            .is_some_and(|entry| entry.channels.contains(&channel))
    }

    /// Channels the observer is registered with, in id order.
    pub fn observer_channels(&self, observer: ObserverId) -> Vec<ChannelId> {
        self.observers
            .get(observer)
            .map(|entry| entry.channels.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Open every channel the observer is registered with. True only if
    /// every open succeeded.
    pub fn open_registered(&mut self, observer: ObserverId) -> bool {
        let mut result = true;
        for channel in self.observer_channels(observer) {
            result &= self.open(channel);
        }
        result
    }

    pub fn close_registered(&mut self, observer: ObserverId) {
        for channel in self.observer_channels(observer) {
            self.close(channel);
        }
    }

    pub fn destroy_registered(&mut self, observer: ObserverId) {
        for channel in self.observer_channels(observer) {
            self.destroy_channel(channel);
        }
    }

    pub fn all_registered_ready(&self, observer: ObserverId) -> bool {
        self.observers.get(observer).is_some_and(|entry| {
            entry
                .channels
                .iter()
                .all(|channel| is_ready(self, *channel))
        })
    }

    /// Poll until every channel the observer is registered with is ready or
    /// `timeout` elapses.
    pub fn wait_registered_ready(
        &mut self,
        observer: ObserverId,
        timeout: Duration,
        interval: Duration,
    ) -> bool {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let deadline = Instant::now() + timeout;
        let mut ready = self.all_registered_ready(observer);
        while !ready && Instant::now() < deadline {
            std::thread::sleep(interval);
            self.poll_default();
            ready = self.all_registered_ready(observer);
        }
        ready
    }
}
