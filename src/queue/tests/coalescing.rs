//! Tests for duplicate coalescing under load

#[cfg(test)]
mod tests {
    use crate::queue::{Notification, NotificationQueue, NotificationSender, RequestToken, UpdateEvent};
    use crate::registry::ForeignHandle;

    const THRESHOLD: usize = 100;

    fn update(handle: u64, token: u64, marker: u8) -> UpdateEvent {
        UpdateEvent::new(ForeignHandle(handle), None, 16, 1, RequestToken(token))
            .with_values(vec![marker])
    }

    fn fill(sender: &NotificationSender, count: usize) {
        for i in 0..count {
            sender.enqueue_diagnostic(format!("filler {}", i));
        }
    }

    fn update_markers(queue: &NotificationQueue) -> Vec<u8> {
        let mut markers = Vec::new();
        queue.drain(usize::MAX, |item| {
            if let Notification::Update(event) = item {
                markers.push(event.values[0]);
            }
        });
        markers
    }

    #[test]
    fn test_later_update_supersedes_earlier_above_threshold() {
        let queue = NotificationQueue::new(THRESHOLD);
        queue.initialise();
        let sender = queue.sender();
        fill(&sender, THRESHOLD + 1);

        sender.enqueue_update(update(1, 7, 1));
        sender.enqueue_update(update(1, 7, 2));

        assert_eq!(queue.stats().discarded, 1);
        assert_eq!(update_markers(&queue), vec![2]);
    }

    #[test]
    fn test_no_coalescing_below_threshold() {
        let queue = NotificationQueue::new(THRESHOLD);
        queue.initialise();
        let sender = queue.sender();
        fill(&sender, THRESHOLD - 2);

        sender.enqueue_update(update(1, 7, 1));
        sender.enqueue_update(update(1, 7, 2));

        assert_eq!(queue.stats().discarded, 0);
        assert_eq!(update_markers(&queue), vec![1, 2]);
    }

    #[test]
    fn test_different_keys_are_independent() {
        let queue = NotificationQueue::new(THRESHOLD);
        queue.initialise();
        let sender = queue.sender();
        fill(&sender, THRESHOLD + 1);

        sender.enqueue_update(update(1, 7, 1));
        sender.enqueue_update(update(2, 7, 2));
        sender.enqueue_update(update(1, 8, 3));
        let mut other_type = update(1, 7, 4);
        other_type.dbr_type = 34;
        sender.enqueue_update(other_type);

        assert_eq!(queue.stats().discarded, 0);
        assert_eq!(update_markers(&queue), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_only_the_single_oldest_duplicate_is_removed() {
        let queue = NotificationQueue::new(THRESHOLD);
        queue.initialise();
        let sender = queue.sender();
        sender.enqueue_update(update(1, 7, 1));
        sender.enqueue_update(update(1, 7, 2));
        fill(&sender, THRESHOLD);

        sender.enqueue_update(update(1, 7, 3));

        assert_eq!(queue.take_discarded_updates(), 1);
        assert_eq!(queue.take_discarded_updates(), 0);
        assert_eq!(update_markers(&queue), vec![2, 3]);
    }

    #[test]
    fn test_connection_events_survive_overload() {
        let queue = NotificationQueue::new(THRESHOLD);
        queue.initialise();
        let sender = queue.sender();
        for i in 0..(THRESHOLD * 2) {
            sender.enqueue_connection(ForeignHandle(1), None, i % 2 == 0);
        }

        let mut connections = 0;
        queue.drain(usize::MAX, |item| {
            if let Notification::Connection(_) = item {
                connections += 1;
            }
        });
        assert_eq!(connections, THRESHOLD * 2);
        assert_eq!(queue.stats().discarded, 0);
    }

    #[test]
    fn test_slice_payload_is_copied() {
        let queue = NotificationQueue::new(THRESHOLD);
        queue.initialise();
        let buffer = 3.25f32.to_ne_bytes();
        queue
            .sender()
            .enqueue_update_from_slice(update(1, 1, 0).with_values(Vec::new()), &buffer);

        let mut values = Vec::new();
        queue.drain(1, |item| {
            if let Notification::Update(event) = item {
                values = event.values;
            }
        });
        assert_eq!(values, buffer.to_vec());
    }
}
