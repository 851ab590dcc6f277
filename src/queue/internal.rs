//! Lock-protected queue state
//!
//! Entries carry consecutive sequence numbers and are only ever pushed at
//! the back and popped at the front, so the position of a sequence number is
//! `seq - front_seq`. A coalesced entry is left in place as a tombstone and
//! skipped when it reaches the front. Queued updates are indexed by
//! coalescing key, oldest first, so finding the oldest duplicate is O(1).

use crate::queue::error::EnqueueError;
use crate::queue::item::{CoalesceKey, Notification};
use std::collections::{HashMap, VecDeque};

#[derive(Debug)]
struct Entry {
    sequence: u64,
    item: Option<Notification>,
}

#[derive(Debug)]
pub(crate) struct QueueState {
    initialised: bool,
    entries: VecDeque<Entry>,
    next_sequence: u64,
    live: usize,
    pending_updates: HashMap<CoalesceKey, VecDeque<u64>>,
    coalesce_threshold: usize,
    discarded: u64,
}

impl QueueState {
    pub(crate) fn new(coalesce_threshold: usize) -> Self {
        Self {
            initialised: false,
            entries: VecDeque::new(),
            next_sequence: 0,
            live: 0,
            pending_updates: HashMap::new(),
            coalesce_threshold,
            discarded: 0,
        }
    }

    pub(crate) fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub(crate) fn set_initialised(&mut self, initialised: bool) {
        self.initialised = initialised;
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn coalesce_threshold(&self) -> usize {
        self.coalesce_threshold
    }

    pub(crate) fn set_coalesce_threshold(&mut self, threshold: usize) {
        self.coalesce_threshold = threshold;
    }

    pub(crate) fn discarded(&self) -> u64 {
        self.discarded
    }

    pub(crate) fn take_discarded(&mut self) -> u64 {
        std::mem::take(&mut self.discarded)
    }

    /// Append `item`. Returns the update it superseded, if any, so the
    /// caller can drop it after releasing the lock.
    pub(crate) fn push(
        &mut self,
        item: Notification,
    ) -> Result<Option<Notification>, EnqueueError> {
        if !self.initialised {
            return Err(EnqueueError::NotInitialised);
        }
        self.entries
            .try_reserve(1)
            .map_err(|_| EnqueueError::AllocationFailed)?;

        let sequence = self.next_sequence;
        let mut superseded = None;

        if let Notification::Update(event) = &item {
            self.pending_updates
                .try_reserve(1)
                .map_err(|_| EnqueueError::AllocationFailed)?;
            let key = event.coalesce_key();
            if self.live > self.coalesce_threshold {
                superseded = self.take_oldest(&key);
            }
            let sequences = self.pending_updates.entry(key).or_default();
            sequences
                .try_reserve(1)
                .map_err(|_| EnqueueError::AllocationFailed)?;
            sequences.push_back(sequence);
        }

        self.next_sequence += 1;
        self.entries.push_back(Entry {
            sequence,
            item: Some(item),
        });
        self.live += 1;
        Ok(superseded)
    }

    fn take_oldest(&mut self, key: &CoalesceKey) -> Option<Notification> {
        let sequence = self.pending_updates.get_mut(key)?.pop_front()?;
        let front = self.entries.front()?.sequence;
        let entry = self.entries.get_mut((sequence - front) as usize)?;
        debug_assert_eq!(entry.sequence, sequence);
        let item = entry.item.take()?;
        self.live -= 1;
        self.discarded += 1;
        Some(item)
    }

    /// Remove the oldest live item.
    pub(crate) fn pop(&mut self) -> Option<Notification> {
        while let Some(entry) = self.entries.pop_front() {
            let Some(item) = entry.item else {
                continue;
            };
            if let Notification::Update(event) = &item {
                let key = event.coalesce_key();
                if let Some(sequences) = self.pending_updates.get_mut(&key) {
                    if sequences.front() == Some(&entry.sequence) {
                        sequences.pop_front();
                    }
                    if sequences.is_empty() {
                        self.pending_updates.remove(&key);
                    }
                }
            }
            self.live -= 1;
            return Some(item);
        }
        None
    }

    /// Detach everything queued so it can be dropped outside the lock.
    pub(crate) fn take_all(&mut self) -> VecDeque<Notification> {
        self.pending_updates.clear();
        self.live = 0;
        std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|entry| entry.item)
            .collect()
    }
}
