//! Reasons an item can fail to enter the queue
//!
//! These never reach producers; the sender counts them as dropped.

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("queue is not initialised")]
    NotInitialised,

    #[error("allocation failed while queueing")]
    AllocationFailed,
}
