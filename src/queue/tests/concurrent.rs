//! Tests for many producers feeding one consumer

#[cfg(test)]
mod tests {
    use crate::queue::{Notification, NotificationQueue, RequestToken, UpdateEvent};
    use crate::registry::ForeignHandle;
    use std::collections::HashMap;
    use std::thread;
    use tokio::task::JoinSet;

    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 500;

    fn parse(text: &str) -> (u64, u64) {
        let (producer, index) = text.split_once(':').unwrap();
        (producer.parse().unwrap(), index.parse().unwrap())
    }

    #[test]
    fn test_per_producer_order_preserved_while_draining() {
        let queue = NotificationQueue::new(100_000);
        queue.initialise();
        let total = (PRODUCERS * PER_PRODUCER * 2) as usize;

        let mut last_diag: HashMap<u64, u64> = HashMap::new();
        let mut last_update: HashMap<u64, u64> = HashMap::new();
        let mut received = 0;

        thread::scope(|scope| {
            for producer in 0..PRODUCERS {
                let sender = queue.sender();
                scope.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        sender.enqueue_diagnostic(format!("{}:{}", producer, i));
                        sender.enqueue_update(
                            UpdateEvent::new(ForeignHandle(producer), None, 16, 1, RequestToken(i))
                                .with_values(i.to_ne_bytes().to_vec()),
                        );
                    }
                });
            }

            while received < total {
                queue.drain(64, |item| {
                    received += 1;
                    match item {
                        Notification::Diagnostic(text) => {
                            let (producer, index) = parse(&text);
                            if let Some(previous) = last_diag.insert(producer, index) {
                                assert!(index > previous, "diagnostics reordered");
                            }
                        }
                        Notification::Update(event) => {
                            let producer = event.handle.0;
                            let index = event.token.0;
                            if let Some(previous) = last_update.insert(producer, index) {
                                assert!(index > previous, "updates reordered");
                            }
                        }
                        Notification::Connection(_) => panic!("no connections sent"),
                    }
                });
                thread::yield_now();
            }
        });

        assert_eq!(received, total);
        assert_eq!(queue.stats().dropped, 0);
        assert_eq!(queue.len(), Some(0));
    }

    #[tokio::test]
    async fn test_senders_usable_from_tasks() {
        let queue = NotificationQueue::new(1000);
        queue.initialise();

        let mut tasks = JoinSet::new();
        for producer in 0..PRODUCERS {
            let sender = queue.sender();
            tasks.spawn(async move {
                for i in 0..10u64 {
                    sender.enqueue_connection(ForeignHandle(producer), None, i % 2 == 0);
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        let mut per_handle: HashMap<u64, Vec<bool>> = HashMap::new();
        queue.drain(usize::MAX, |item| {
            if let Notification::Connection(event) = item {
                per_handle.entry(event.handle.0).or_default().push(event.is_up);
            }
        });
        for states in per_handle.values() {
            let expected: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
            assert_eq!(states, &expected);
        }
        assert_eq!(per_handle.len(), PRODUCERS as usize);
    }
}
