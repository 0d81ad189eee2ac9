//! Task-local scratch values with first-touch initialization.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::runtime;

/// A lazily initialized, task-scoped value.
///
/// The handle is shared by reference across tasks. Each task materializes
/// its own copy on first access by running the initializer, sees the same
/// copy on every later access, and drops it when the task ends. Different
/// tasks never share a copy. Threads not owned by the runtime behave as a
/// single long-lived task, so access from outside a parallel operation works
/// the same way.
///
/// If the initializer panics the slot stays unset, and a later access in the
/// same task re-attempts initialization.
///
/// # Examples
/// ```
/// use parafold::TaskLocal;
///
/// let scratch: TaskLocal<Vec<f64>> = TaskLocal::new(|| vec![0.0; 16]);
/// scratch.with(|buffer| buffer[0] = 1.0);
/// assert_eq!(scratch.with(|buffer| buffer[0]), 1.0);
/// ```
pub struct TaskLocal<T> {
    key: u64,
    init: Box<dyn Fn() -> T + Send + Sync>,
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

impl<T: 'static> TaskLocal<T> {
    /// Creates the handle; the initializer runs once per task, on first
    /// access.
    pub fn new(init: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
            init: Box::new(init),
        }
    }

    /// Runs `f` on this task's value, initializing it first if needed.
    ///
    /// Nested access to a *different* `TaskLocal` from inside `f` or the
    /// initializer is fine; re-entering the same handle is not supported and
    /// panics.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let cell = match runtime::task_slot::<T>(self.key) {
            Some(cell) => cell,
            None => {
                let value = (self.init)();
                runtime::insert_task_slot(self.key, value)
            }
        };
        let mut value = cell.borrow_mut();
        f(&mut value)
    }

    /// Clones this task's value out of its slot.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(|value| value.clone())
    }
}

impl<T> std::fmt::Debug for TaskLocal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLocal").field("key", &self.key).finish_non_exhaustive()
    }
}
