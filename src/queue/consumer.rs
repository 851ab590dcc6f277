//! Consumer side of the notification queue

use crate::core::config::MIN_COALESCE_THRESHOLD;
use crate::core::sync::recover_poison;
use crate::queue::error::EnqueueError;
use crate::queue::internal::QueueState;
use crate::queue::item::Notification;
use crate::queue::publisher::NotificationSender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// State shared between the consumer and every sender.
#[derive(Debug)]
pub(crate) struct SharedQueue {
    state: Mutex<QueueState>,
    dropped: AtomicU64,
    unreported_drops: AtomicU64,
}

impl SharedQueue {
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        recover_poison(self.state.lock(), "notification queue")
    }

    /// Count an item that never entered the queue. Allocation failures are
    /// also reported on the next drain.
    pub(crate) fn record_drop(&self, reason: EnqueueError) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if reason == EnqueueError::AllocationFailed {
            self.unreported_drops.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Items currently queued.
    pub depth: usize,
    /// Updates superseded by coalescing since the last
    /// [`NotificationQueue::take_discarded_updates`].
    pub discarded: u64,
    /// Items that never entered the queue.
    pub dropped: u64,
    pub coalesce_threshold: usize,
}

/// Single-consumer end of the notification queue.
///
/// Any number of [`NotificationSender`]s feed it from any thread. The
/// owner drains it from one thread; each item is handed over with the lock
/// released and dropped once the callback returns.
///
/// A new queue is uninitialised: senders' items are dropped and
/// [`drain`](Self::drain) returns `None` until [`initialise`](Self::initialise).
#[derive(Debug)]
pub struct NotificationQueue {
    shared: Arc<SharedQueue>,
}

impl NotificationQueue {
    pub fn new(coalesce_threshold: usize) -> Self {
        Self {
            shared: Arc::new(SharedQueue {
                state: Mutex::new(QueueState::new(
                    coalesce_threshold.max(MIN_COALESCE_THRESHOLD),
                )),
                dropped: AtomicU64::new(0),
                unreported_drops: AtomicU64::new(0),
            }),
        }
    }

    pub fn sender(&self) -> NotificationSender {
        NotificationSender::new(Arc::clone(&self.shared))
    }

    /// Start accepting items. Calling it again has no effect.
    pub fn initialise(&self) {
        self.shared.lock().set_initialised(true);
    }

    pub fn is_initialised(&self) -> bool {
        self.shared.lock().is_initialised()
    }

    /// Discard everything queued and stop accepting items.
    pub fn shutdown(&self) {
        let remaining = {
            let mut state = self.shared.lock();
            state.set_initialised(false);
            state.take_all()
        };
        if !remaining.is_empty() {
            log::debug!("Discarded {} queued notifications at shutdown", remaining.len());
        }
    }

    /// Hand up to `max_items` queued items to `dispatch`, oldest first.
    ///
    /// At least one item is handled whenever any is queued, even if
    /// `max_items` is zero. Returns the number handled, or `None` if the
    /// queue is not initialised.
    pub fn drain<F>(&self, max_items: usize, mut dispatch: F) -> Option<usize>
    where
        F: FnMut(Notification),
    {
        if !self.is_initialised() {
            return None;
        }
        self.report_drops();

        let limit = max_items.max(1);
        let mut processed = 0;
        while processed < limit {
            let next = self.shared.lock().pop();
            match next {
                Some(item) => {
                    dispatch(item);
                    processed += 1;
                }
                None => break,
            }
        }
        Some(processed)
    }

    /// Drop every queued item without dispatching it. Safe to call at any
    /// time, including before initialisation.
    pub fn clear_all(&self) {
        let remaining = self.shared.lock().take_all();
        drop(remaining);
    }

    /// Queue depth, or `None` if not initialised.
    pub fn len(&self) -> Option<usize> {
        let state = self.shared.lock();
        state.is_initialised().then(|| state.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len().unwrap_or(0) == 0
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        QueueStats {
            depth: state.len(),
            discarded: state.discarded(),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            coalesce_threshold: state.coalesce_threshold(),
        }
    }

    /// Number of updates superseded since the previous call.
    pub fn take_discarded_updates(&self) -> u64 {
        self.shared.lock().take_discarded()
    }

    pub fn coalesce_threshold(&self) -> usize {
        self.shared.lock().coalesce_threshold()
    }

    /// Set the coalescing threshold; values below the minimum are raised.
    pub fn set_coalesce_threshold(&self, threshold: usize) {
        self.shared
            .lock()
            .set_coalesce_threshold(threshold.max(MIN_COALESCE_THRESHOLD));
    }

    fn report_drops(&self) {
        let count = self.shared.unreported_drops.swap(0, Ordering::Relaxed);
        if count > 0 {
            crate::report_error!("{} notification(s) could not be queued and were lost", count);
        }
    }
}
