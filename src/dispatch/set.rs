//! Sets of channels handled as a group

use crate::context::Context;
use crate::registry::{ChannelId, ObserverId};
use crate::types::ReadMode;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Shortest interval between polls while waiting for readiness.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// An unordered set of channels.
///
/// An owning set destroys its members when [`release`](Self::release)d.
/// Members destroyed elsewhere stay in the set and are skipped by every
/// group operation.
#[derive(Debug, Default)]
pub struct ChannelSet {
    members: BTreeSet<ChannelId>,
    owning: bool,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that destroys its members on release.
    pub fn owning() -> Self {
        Self {
            members: BTreeSet::new(),
            owning: true,
        }
    }

    pub fn is_owning(&self) -> bool {
        self.owning
    }

    pub fn insert(&mut self, channel: ChannelId) -> bool {
        self.members.insert(channel)
    }

    pub fn remove(&mut self, channel: ChannelId) -> bool {
        self.members.remove(&channel)
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.members.contains(&channel)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Forget every member without destroying any.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn insert_all(&mut self, other: &ChannelSet) {
        self.members.extend(other.members.iter().copied());
    }

    pub fn remove_all(&mut self, other: &ChannelSet) {
        for channel in &other.members {
            self.members.remove(channel);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.members.iter().copied()
    }

    /// Call `f` for each member that is still alive. The membership is
    /// captured first, so `f` may destroy channels.
    pub fn iterate<F>(&self, cx: &mut Context, mut f: F)
    where
        F: FnMut(&mut Context, ChannelId),
    {
        let snapshot: Vec<ChannelId> = self.iter().collect();
        for channel in snapshot {
            if cx.contains_channel(channel) {
                f(cx, channel);
            }
        }
    }

    pub fn register_all(&self, cx: &mut Context, observer: ObserverId) {
        for channel in self.iter() {
            cx.register(observer, channel);
        }
    }

    pub fn deregister_all(&self, cx: &mut Context, observer: ObserverId) {
        for channel in self.iter() {
            cx.deregister(observer, channel);
        }
    }

    /// Open every member. True only if every open succeeded.
    pub fn open_all(&self, cx: &mut Context) -> bool {
        let mut result = true;
        for channel in self.iter() {
            if cx.contains_channel(channel) {
                result &= cx.open(channel);
            }
        }
        result
    }

    pub fn close_all(&self, cx: &mut Context) {
        self.iterate(cx, |cx, channel| cx.close(channel));
    }

    /// Whether every live member is connected and, unless it never reads,
    /// holds data.
    pub fn all_ready(&self, cx: &Context) -> bool {
        self.iter()
            .filter(|channel| cx.contains_channel(*channel))
            .all(|channel| is_ready(cx, channel))
    }

    /// Poll the context until every member is ready or `timeout` elapses.
    pub fn wait_all_ready(&self, cx: &mut Context, timeout: Duration, interval: Duration) -> bool {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let deadline = Instant::now() + timeout;
        let mut ready = self.all_ready(cx);
        while !ready && Instant::now() < deadline {
            std::thread::sleep(interval);
            cx.poll_default();
            ready = self.all_ready(cx);
        }
        ready
    }

    /// As [`wait_all_ready`](Self::wait_all_ready), sleeping on the tokio
    /// timer instead of blocking the thread.
    pub async fn wait_all_ready_async(
        &self,
        cx: &mut Context,
        timeout: Duration,
        interval: Duration,
    ) -> bool {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut ready = self.all_ready(cx);
        while !ready && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(interval).await;
            cx.poll_default();
            ready = self.all_ready(cx);
        }
        ready
    }

    /// Empty the set, destroying the members first if it is owning.
    pub fn release(&mut self, cx: &mut Context) {
        let members = std::mem::take(&mut self.members);
        if self.owning {
            for channel in members {
                cx.destroy_channel(channel);
            }
        }
    }
}

impl Drop for ChannelSet {
    fn drop(&mut self) {
        if self.owning && !self.members.is_empty() {
            log::warn!(
                "Owning channel set dropped with {} member(s) not released",
                self.members.len()
            );
        }
    }
}

pub(crate) fn is_ready(cx: &Context, channel: ChannelId) -> bool {
    match cx.channel(channel) {
        Some(state) if state.options().read_mode == ReadMode::NoRead => state.is_connected(),
        Some(state) => state.data_is_available(),
        None => false,
    }
}
