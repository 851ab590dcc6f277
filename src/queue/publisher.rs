//! Producer side of the notification queue

use crate::queue::consumer::SharedQueue;
use crate::queue::error::EnqueueError;
use crate::queue::item::{ConnectionEvent, Notification, UpdateEvent};
use crate::registry::{ChannelTag, ForeignHandle};
use std::sync::Arc;

/// Cloneable handle used by service threads to queue notifications.
///
/// Enqueueing never blocks on the consumer beyond a short critical section
/// and never fails visibly: anything that cannot be queued is counted in
/// [`QueueStats::dropped`](crate::queue::QueueStats) and reported on the
/// next drain.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    shared: Arc<SharedQueue>,
}

impl NotificationSender {
    pub(crate) fn new(shared: Arc<SharedQueue>) -> Self {
        Self { shared }
    }

    pub fn enqueue_connection(&self, handle: ForeignHandle, tag: Option<ChannelTag>, is_up: bool) {
        self.enqueue(Notification::Connection(ConnectionEvent {
            handle,
            tag,
            is_up,
        }));
    }

    /// Queue an update whose value buffer is already owned.
    pub fn enqueue_update(&self, event: UpdateEvent) {
        self.enqueue(Notification::Update(event));
    }

    /// Queue an update, copying its values from a borrowed buffer.
    pub fn enqueue_update_from_slice(&self, mut event: UpdateEvent, values: &[u8]) {
        let mut owned = Vec::new();
        if owned.try_reserve_exact(values.len()).is_err() {
            self.dropped(EnqueueError::AllocationFailed);
            return;
        }
        owned.extend_from_slice(values);
        event.values = owned;
        self.enqueue(Notification::Update(event));
    }

    pub fn enqueue_diagnostic(&self, text: impl Into<String>) {
        self.enqueue(Notification::Diagnostic(text.into()));
    }

    fn enqueue(&self, item: Notification) {
        let outcome = self.shared.lock().push(item);
        match outcome {
            Ok(superseded) => drop(superseded),
            Err(reason) => self.dropped(reason),
        }
    }

    fn dropped(&self, reason: EnqueueError) {
        self.shared.record_drop(reason);
        log::trace!("Notification dropped: {}", reason);
    }
}
