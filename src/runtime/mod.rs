//! Task runtime: named worker pools, joinable tasks, per-task identity.
//!
//! The framework asks little of its runtime: spawn a closure on a named
//! pool (or pinned to a specific worker), join the result, report worker
//! counts, and expose the identity of the running task so task-local
//! storage can key off it. [`Runtime::global`] is the process-wide instance
//! every operation uses; [`Runtime::with_worker_counts`] exists for tests.

mod pool;

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam::channel::Receiver;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use pool::WorkerPool;

/// Named worker pools available to schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PoolKind {
    /// General-purpose pool sized to the machine's CPU count.
    #[default]
    Default,
    /// Smaller pool reserved for short, high-priority kernels. Long-running
    /// kernels on this pool starve everything else scheduled there.
    Interactive,
}

/// Unique identity of a spawned task, or of a foreign thread acting as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn fresh() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric form of the identity, for logging.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Snapshot of the runtime's task counters.
///
/// The no-spawn fast paths of the parallel operations are observable here:
/// a serial, empty, or single-chunk operation leaves `tasks_spawned`
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Tasks handed to a pool since the runtime started.
    pub tasks_spawned: usize,
    /// Tasks that finished running.
    pub tasks_completed: usize,
}

#[derive(Default)]
pub(crate) struct Counters {
    spawned: AtomicUsize,
    completed: AtomicUsize,
}

/// A unit of work queued on a pool.
pub(crate) struct Job {
    id: TaskId,
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    pub(crate) fn run(self) {
        enter_task(self.id, self.work);
    }
}

/// Handle to a spawned task.
pub struct JoinHandle<T> {
    id: TaskId,
    rx: Receiver<std::result::Result<T, String>>,
}

impl<T> JoinHandle<T> {
    /// Identity of the spawned task.
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task finishes and returns its result.
    ///
    /// A panic inside the task surfaces as [`Error::Kernel`]; a worker that
    /// vanished without delivering a result surfaces as [`Error::Runtime`].
    pub fn join(self) -> Result<T> {
        match self.rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(panic)) => Err(Error::Kernel(panic)),
            Err(_) => Err(Error::runtime("worker exited before delivering a result")),
        }
    }
}

/// The task runtime: two named pools plus task bookkeeping.
pub struct Runtime {
    default_pool: WorkerPool,
    interactive_pool: WorkerPool,
    counters: Arc<Counters>,
}

impl Runtime {
    /// The process-wide runtime, started on first use.
    pub fn global() -> &'static Runtime {
        static GLOBAL: Lazy<Runtime> = Lazy::new(|| {
            let workers = num_cpus::get().max(1);
            Runtime::with_worker_counts(workers, workers.min(4))
        });
        &GLOBAL
    }

    /// Builds a runtime with explicit pool sizes. Mostly useful in tests;
    /// the parallel operations always run on [`Runtime::global`].
    pub fn with_worker_counts(default_workers: usize, interactive_workers: usize) -> Self {
        let counters = Arc::new(Counters::default());
        Self {
            default_pool: WorkerPool::new("parafold-worker", default_workers.max(1)),
            interactive_pool: WorkerPool::new("parafold-interactive", interactive_workers.max(1)),
            counters,
        }
    }

    /// Number of workers in a pool.
    pub fn worker_count(&self, pool: PoolKind) -> usize {
        self.pool(pool).worker_count()
    }

    /// Snapshot of the task counters.
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            tasks_spawned: self.counters.spawned.load(Ordering::Relaxed),
            tasks_completed: self.counters.completed.load(Ordering::Relaxed),
        }
    }

    /// Runs `f` as a task on `pool`, returning a joinable handle. Tasks on a
    /// pool may run on any of its workers.
    pub fn spawn<T, F>(&self, pool: PoolKind, f: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        // Safety: closure and result are 'static, nothing can dangle.
        unsafe { self.spawn_unchecked(pool, f) }
    }

    /// Runs `f` pinned to worker `index mod worker_count` of the default
    /// pool; the task does not migrate.
    pub fn spawn_on<T, F>(&self, index: usize, f: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        // Safety: closure and result are 'static, nothing can dangle.
        unsafe { self.spawn_on_unchecked(index, f) }
    }

    /// Spawns without the `'static` bound.
    ///
    /// # Safety
    /// The caller must join the returned handle before any borrow captured
    /// by `f` (or reachable from `T`) goes out of scope. The parallel
    /// operations uphold this by joining every handle before returning.
    pub(crate) unsafe fn spawn_unchecked<'env, T, F>(&self, pool: PoolKind, f: F) -> JoinHandle<T>
    where
        T: Send + 'env,
        F: FnOnce() -> T + Send + 'env,
    {
        let (job, handle) = unsafe { pack_job(f, self.counters.clone()) };
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
        self.pool(pool).push(job);
        handle
    }

    /// Pinned variant of [`spawn_unchecked`](Self::spawn_unchecked), with
    /// the same safety contract.
    pub(crate) unsafe fn spawn_on_unchecked<'env, T, F>(&self, index: usize, f: F) -> JoinHandle<T>
    where
        T: Send + 'env,
        F: FnOnce() -> T + Send + 'env,
    {
        let (job, handle) = unsafe { pack_job(f, self.counters.clone()) };
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
        self.default_pool.push_pinned(index, job);
        handle
    }

    fn pool(&self, kind: PoolKind) -> &WorkerPool {
        match kind {
            PoolKind::Default => &self.default_pool,
            PoolKind::Interactive => &self.interactive_pool,
        }
    }
}

/// Boxes `f` into a queueable job plus the handle to its one-shot result
/// channel.
///
/// # Safety
/// Erases the closure's lifetime; the caller must guarantee the job has run
/// (i.e. the handle was joined) before `'env` ends.
unsafe fn pack_job<'env, T, F>(f: F, counters: Arc<Counters>) -> (Job, JoinHandle<T>)
where
    T: Send + 'env,
    F: FnOnce() -> T + Send + 'env,
{
    let (tx, rx) = crossbeam::channel::bounded::<std::result::Result<T, String>>(1);
    let id = TaskId::fresh();
    let work: Box<dyn FnOnce() + Send + 'env> = Box::new(move || {
        let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(panic_message);
        counters.completed.fetch_add(1, Ordering::Relaxed);
        // The receiver may be gone if the caller's join already failed.
        let _ = tx.send(outcome);
    });
    let work: Box<dyn FnOnce() + Send + 'static> = unsafe { std::mem::transmute(work) };
    (Job { id, work }, JoinHandle { id, rx })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

struct TaskContext {
    id: TaskId,
    slots: HashMap<u64, Rc<dyn Any>>,
}

impl TaskContext {
    fn fresh() -> Self {
        Self { id: TaskId::fresh(), slots: HashMap::new() }
    }
}

thread_local! {
    static TASK_CONTEXT: RefCell<TaskContext> = RefCell::new(TaskContext::fresh());
}

/// Identity of the task executing the caller. Threads not owned by the
/// runtime behave as a single long-lived task.
pub fn current_task_id() -> TaskId {
    TASK_CONTEXT.with(|context| context.borrow().id)
}

/// Runs `f` under a fresh task context; the task's local storage is dropped
/// when `f` returns. `f` must not unwind (jobs catch panics internally).
fn enter_task(id: TaskId, f: impl FnOnce()) {
    let previous = TASK_CONTEXT.with(|context| {
        std::mem::replace(
            &mut *context.borrow_mut(),
            TaskContext { id, slots: HashMap::new() },
        )
    });
    f();
    TASK_CONTEXT.with(|context| *context.borrow_mut() = previous);
}

/// Looks up the current task's slot for a task-local key.
pub(crate) fn task_slot<T: 'static>(key: u64) -> Option<Rc<RefCell<T>>> {
    TASK_CONTEXT.with(|context| {
        context.borrow().slots.get(&key).map(|slot| {
            slot.clone()
                .downcast::<RefCell<T>>()
                .ok()
                .expect("task-local slot holds the initializer's type")
        })
    })
}

/// Stores a freshly initialized value in the current task's slot.
pub(crate) fn insert_task_slot<T: 'static>(key: u64, value: T) -> Rc<RefCell<T>> {
    let cell = Rc::new(RefCell::new(value));
    TASK_CONTEXT.with(|context| {
        context
            .borrow_mut()
            .slots
            .insert(key, cell.clone() as Rc<dyn Any>);
    });
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spawned_tasks_deliver_their_results() {
        let runtime = Runtime::with_worker_counts(2, 1);
        let handle = runtime.spawn(PoolKind::Default, || 2 + 2);
        assert_eq!(handle.join().unwrap(), 4);
    }

    #[test]
    fn pinned_tasks_stay_on_their_worker() {
        let runtime = Runtime::with_worker_counts(2, 1);
        let first = runtime
            .spawn_on(0, || std::thread::current().id())
            .join()
            .unwrap();
        let again = runtime
            .spawn_on(2, || std::thread::current().id())
            .join()
            .unwrap();
        // Index 2 wraps back onto worker 0 of a two-worker pool.
        assert_eq!(first, again);
    }

    #[test]
    fn panics_surface_as_kernel_errors_on_join() {
        let runtime = Runtime::with_worker_counts(1, 1);
        let handle = runtime.spawn(PoolKind::Default, || panic!("boom"));
        match handle.join() {
            Err(Error::Kernel(message)) => assert_eq!(message, "boom"),
            other => panic!("expected a kernel error, got {other:?}"),
        }
        // The worker survives the panic.
        let handle = runtime.spawn(PoolKind::Default, || 1);
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn stats_count_spawns_and_completions() {
        let runtime = Runtime::with_worker_counts(2, 1);
        let before = runtime.stats();
        let handles: Vec<_> = (0..4)
            .map(|i| runtime.spawn(PoolKind::Default, move || i))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let after = runtime.stats();
        assert_eq!(after.tasks_spawned - before.tasks_spawned, 4);
        assert_eq!(after.tasks_completed - before.tasks_completed, 4);
    }

    #[test]
    fn each_task_gets_a_distinct_identity() {
        let runtime = Runtime::with_worker_counts(1, 1);
        let first = runtime
            .spawn(PoolKind::Default, current_task_id)
            .join()
            .unwrap();
        let second = runtime
            .spawn(PoolKind::Default, current_task_id)
            .join()
            .unwrap();
        assert_ne!(first, second);
        assert_ne!(first, current_task_id());
    }
}
