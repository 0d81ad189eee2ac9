//! One-at-a-time execution region.

use std::sync::{Condvar, Mutex};

use super::{lock, wait};
use crate::runtime::{self, TaskId};

/// A mutually exclusive region with re-entrant admission.
///
/// [`with`](Self::with) runs the closure while holding the region; the
/// order in which waiting tasks are admitted is unspecified. A task already
/// inside the region may enter it again. The region is released on every
/// exit path, including a panicking closure.
#[derive(Debug, Default)]
pub struct SerialRegion {
    state: Mutex<Owner>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct Owner {
    holder: Option<TaskId>,
    depth: usize,
}

impl SerialRegion {
    /// Creates an open region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with exclusive access to the region and returns its value.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        self.acquire(runtime::current_task_id());
        let _release = Release { region: self };
        f()
    }

    fn acquire(&self, me: TaskId) {
        let mut state = lock(&self.state);
        loop {
            match state.holder {
                Some(holder) if holder == me => {
                    state.depth += 1;
                    return;
                }
                None => {
                    state.holder = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(_) => state = wait(&self.released, state),
            }
        }
    }

    fn release(&self) {
        let mut state = lock(&self.state);
        state.depth -= 1;
        if state.depth == 0 {
            state.holder = None;
            self.released.notify_all();
        }
    }
}

struct Release<'a> {
    region: &'a SerialRegion,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.region.release();
    }
}
