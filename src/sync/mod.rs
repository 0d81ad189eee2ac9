//! Structured synchronization primitives for use inside kernels.
//!
//! Kernels running under a parallel scheduler sometimes need to coordinate:
//! run a setup step exactly once, serialize access to something that is not
//! thread-safe, or rendezvous between iterations. These primitives
//! encapsulate their own synchronization so kernels stay lock-free
//! otherwise.

mod barrier;
mod once;
mod serial;

pub use barrier::{Barrier, BarrierWaitResult};
pub use once::OnceRegion;
pub use serial::SerialRegion;

use std::sync::{Condvar, Mutex, MutexGuard};

/// Locks a mutex, recovering the guard if a peer panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Waits on a condition variable with the same poison recovery.
fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    match condvar.wait(guard) {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
