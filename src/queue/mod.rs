//! Notification queue
//!
//! Decouples the service library's threads from the single thread that owns
//! the channels. Producers hold a [`NotificationSender`]; the owner drains a
//! [`NotificationQueue`].
//!
//! ```text
//! ┌────────────┐  ┌────────────┐  ┌────────────┐
//! │ io thread  │  │ io thread  │  │ timer      │   service library threads
//! └─────┬──────┘  └─────┬──────┘  └─────┬──────┘
//!       │ enqueue_*     │               │
//!       ▼               ▼               ▼
//! ┌─────────────────────────────────────────────┐
//! │  Mutex<QueueState>                          │
//! │  ┌───┬───┬───┬───┬───┬───┬───┐              │
//! │  │ C │ U │ U │ † │ D │ U │...│  FIFO        │   † coalesced update
//! │  └───┴───┴───┴───┴───┴───┴───┘              │
//! │  per-key index of queued updates            │
//! └──────────────────────┬──────────────────────┘
//!                        │ drain(max, dispatch), lock released per item
//!                        ▼
//!                 ┌─────────────┐
//!                 │  consumer   │   Context::poll
//!                 └─────────────┘
//! ```
//!
//! Order is FIFO across producers. Once the depth exceeds the coalescing
//! threshold, a newly queued update removes the oldest queued update with
//! the same handle, request type and token. Connection events and
//! diagnostics are never removed.
//!
//! # Example
//!
//! ```rust
//! use pvlink::queue::{Notification, NotificationQueue};
//! use pvlink::registry::ForeignHandle;
//!
//! let queue = NotificationQueue::new(1000);
//! queue.initialise();
//! let sender = queue.sender();
//! std::thread::spawn(move || sender.enqueue_connection(ForeignHandle(1), None, true))
//!     .join()
//!     .unwrap();
//!
//! let mut seen = Vec::new();
//! assert_eq!(queue.drain(10, |item| seen.push(item)), Some(1));
//! assert!(matches!(seen[0], Notification::Connection(_)));
//! ```

mod consumer;
mod error;
mod internal;
mod item;
mod publisher;

pub use consumer::{NotificationQueue, QueueStats};
pub use error::EnqueueError;
pub use item::{ConnectionEvent, Notification, RequestToken, UpdateEvent};
pub use publisher::NotificationSender;

#[cfg(test)]
mod tests;
