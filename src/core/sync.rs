//! Lock helpers
//!
//! Producer threads must never see an error from the queue, so a poisoned
//! lock is recovered rather than propagated. The state guarded by these locks
//! stays consistent between statements, so the inner value is still usable.

use std::sync::{LockResult, PoisonError};

/// Unwrap a lock result, recovering the guard if the lock was poisoned.
///
/// `what` names the lock in the warning that is logged on recovery.
pub fn recover_poison<G>(result: LockResult<G>, what: &str) -> G {
    result.unwrap_or_else(|poison_err: PoisonError<G>| {
        log::warn!(
            "Recovered poisoned lock '{}': a thread panicked while holding it",
            what
        );
        poison_err.into_inner()
    })
}

/// Convert a poisoned lock into an application error.
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (lock poisoned). PoisonError: {:?}",
            poison_err
        ))
    })
}
