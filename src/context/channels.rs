use super::Context;
use crate::channel::{Channel, ChannelOptions};
use crate::dispatch::{dispatch, Handlers, Observer};
use crate::registry::{ChannelId, ForeignHandle};
use crate::types::{FieldType, ReadMode};

impl Context {
    /// Create a closed channel using the configured default priority.
    pub fn create_channel(&mut self, name: &str) -> ChannelId {
        let options = ChannelOptions {
            priority: self.config.default_priority,
            ..ChannelOptions::default()
        };
        self.create_channel_with(name, options)
    }

    pub fn create_channel_with(&mut self, name: &str, options: ChannelOptions) -> ChannelId {
        let serial = self.serial;
        let id = self.channels.insert_with_key(|id| {
            let mut channel = Channel::new(id, serial, name);
            channel.set_options(options);
            channel
        });
        log::debug!("Created channel {} for {:?}", id, name);
        id
    }

    pub fn contains_channel(&self, id: ChannelId) -> bool {
        self.channels.contains(id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    /// Mutable access for option setters. Options take effect on the next
    /// open or connect.
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.keys()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn open(&mut self, id: ChannelId) -> bool {
        self.with_channel(id, |channel, link| channel.open(link))
            .unwrap_or(false)
    }

    /// Close the channel, telling observers if it had been reported
    /// connected.
    pub fn close(&mut self, id: ChannelId) {
        if let Some(event) = self.with_channel(id, |channel, link| channel.close(link)).flatten() {
            dispatch(self, id, event);
        }
    }

    pub fn reopen(&mut self, id: ChannelId) -> bool {
        self.close(id);
        self.open(id)
    }

    /// Issue a single read on a connected channel.
    pub fn reread(&mut self, id: ChannelId) -> bool {
        self.with_channel(id, |channel, link| channel.reread(link))
            .unwrap_or(false)
    }

    /// Issue a read or subscription by hand, whatever the channel's read mode.
    pub fn read_subscribe(&mut self, id: ChannelId, mode: ReadMode) -> bool {
        self.with_channel(id, |channel, link| {
            channel.is_connected() && channel.read_subscribe(link, mode)
        })
        .unwrap_or(false)
    }

    /// Rename a channel. An open channel is closed first, and reopened under
    /// the new name when `reopen` is set.
    pub fn set_name(&mut self, id: ChannelId, name: &str, reopen: bool) -> bool {
        let Some(was_open) = self.channels.get(id).map(|c| c.handle().is_some()) else {
            return false;
        };
        if was_open {
            self.close(id);
        }
        match self.channels.get_mut(id) {
            Some(channel) => channel.rename(name),
            None => return false,
        }
        if was_open && reopen {
            self.open(id)
        } else {
            true
        }
    }

    /// Deregister the channel from every observer, close it without
    /// notifying anyone and free its slot.
    pub fn destroy_channel(&mut self, id: ChannelId) -> bool {
        let observers = match self.channels.get_mut(id) {
            Some(channel) => std::mem::take(&mut channel.observers),
            None => return false,
        };
        for observer in observers {
            if let Some(entry) = self.observers.get_mut(observer) {
                entry.channels.remove(&id);
            }
        }
        self.with_channel(id, |channel, link| channel.close(link));
        self.channels.remove(id);
        log::debug!("Destroyed channel {}", id);
        true
    }

    /// Install the channel's own hook, returning the previous one.
    pub fn set_hook(
        &mut self,
        id: ChannelId,
        hook: Option<Box<dyn Observer>>,
    ) -> Option<Box<dyn Observer>> {
        let channel = self.channels.get_mut(id)?;
        std::mem::replace(&mut channel.hook, hook)
    }

    pub fn set_handlers(&mut self, id: ChannelId, handlers: Handlers) -> bool {
        match self.channels.get_mut(id) {
            Some(channel) => {
                channel.handlers = handlers;
                true
            }
            None => false,
        }
    }

    pub fn read_access(&self, id: ChannelId) -> bool {
        self.connected_handle(id)
            .is_some_and(|handle| self.service.read_access(handle))
    }

    pub fn write_access(&self, id: ChannelId) -> bool {
        self.connected_handle(id)
            .is_some_and(|handle| self.service.write_access(handle))
    }

    fn connected_handle(&self, id: ChannelId) -> Option<ForeignHandle> {
        self.channels
            .get(id)
            .filter(|c| c.is_connected())
            .and_then(Channel::handle)
    }

    // Writes

    pub fn write_floating(&mut self, id: ChannelId, value: f64) -> bool {
        self.with_channel(id, |channel, link| channel.write_floating(link, value))
            .unwrap_or(false)
    }

    pub fn write_integer(&mut self, id: ChannelId, value: i32) -> bool {
        self.with_channel(id, |channel, link| channel.write_integer(link, value))
            .unwrap_or(false)
    }

    pub fn write_string(&mut self, id: ChannelId, value: &str) -> bool {
        self.with_channel(id, |channel, link| channel.write_string(link, value))
            .unwrap_or(false)
    }

    pub fn write_floating_array(&mut self, id: ChannelId, values: &[f64]) -> bool {
        self.with_channel(id, |channel, link| channel.write_floating_array(link, values))
            .unwrap_or(false)
    }

    pub fn write_integer_array(&mut self, id: ChannelId, values: &[i32]) -> bool {
        self.with_channel(id, |channel, link| channel.write_integer_array(link, values))
            .unwrap_or(false)
    }

    pub fn write_string_array<S: AsRef<str>>(&mut self, id: ChannelId, values: &[S]) -> bool {
        self.with_channel(id, |channel, link| channel.write_string_array(link, values))
            .unwrap_or(false)
    }

    pub fn write_bytes(&mut self, id: ChannelId, values: &[u8]) -> bool {
        self.with_channel(id, |channel, link| channel.write_bytes(link, values))
            .unwrap_or(false)
    }

    /// Write `count` elements already encoded as `field`.
    pub fn write_raw(&mut self, id: ChannelId, field: FieldType, count: usize, bytes: &[u8]) -> bool {
        self.with_channel(id, |channel, link| channel.write(link, field, count, bytes))
            .unwrap_or(false)
    }

    /// Give up on an outstanding acknowledged write. Observers hear a failed
    /// acknowledgement.
    pub fn clear_pending_write(&mut self, id: ChannelId) {
        let event = self
            .channels
            .get_mut(id)
            .and_then(Channel::clear_pending_write);
        if let Some(event) = event {
            dispatch(self, id, event);
        }
    }
}
