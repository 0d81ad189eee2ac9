//! Parallel operations: for-each, map, reduce, map-reduce, and collect.
//!
//! Every entry point takes a kernel, one or more inputs, and a
//! [`Scheduler`]. The operation derives a chunk plan, spawns one task per
//! chunk (or a set of pull-loop workers under the greedy scheduler), runs
//! the sequential equivalent of itself inside each task, and folds the
//! partial results on the caller thread.
//!
//! Fast paths: a serial scheduler, an empty input, or a plan with fewer than
//! two chunks all run on the caller thread without spawning anything.
//!
//! Kernels must not start nested parallel operations on the pool they run
//! on; a kernel that needs inner parallelism should use the other pool or
//! the serial scheduler. Reducers are assumed associative, and must also be
//! commutative under a round-robin split or the greedy scheduler.

mod chunked;
mod greedy;
mod serial;

#[cfg(test)]
mod tests;

use std::marker::PhantomData;

use log::trace;

use crate::chunking::{Chunk, ChunkPlan, Chunking, Split};
use crate::dispenser::{FeederDispenser, IndexDispenser, WorkDispenser};
use crate::error::{Error, Result};
use crate::input::{IndexedInput, zip};
use crate::runtime::{JoinHandle, PoolKind, Runtime};
use crate::scheduler::{Greedy, Scheduler};

/// Items buffered ahead of the consumers when feeding a length-unknown
/// iterator to the greedy scheduler.
const FEEDER_CAPACITY: usize = 256;

/// Applies `f` to every element, discarding the results.
///
/// Runs under any scheduler; element visit order is unspecified except for
/// the serial scheduler.
pub fn par_for_each<I, F>(f: F, input: I, scheduler: &Scheduler) -> Result<()>
where
    I: IndexedInput,
    F: Fn(I::Item) + Send + Sync,
{
    drive_for_each(&input, scheduler, &move |_, item| f(item))
}

/// Maps every element through `f`, preserving input order.
///
/// Requires an order-preserving schedule: a consecutive split, and not the
/// greedy scheduler.
pub fn par_map<I, R, F>(f: F, input: I, scheduler: &Scheduler) -> Result<Vec<R>>
where
    I: IndexedInput,
    R: Send,
    F: Fn(I::Item) -> R + Send + Sync,
{
    map_impl("par_map", f, input, scheduler)
}

/// Two-input [`par_map`]; the inputs must share an index domain.
pub fn par_map2<A, B, R, F>(f: F, a: A, b: B, scheduler: &Scheduler) -> Result<Vec<R>>
where
    A: IndexedInput,
    B: IndexedInput,
    R: Send,
    F: Fn(A::Item, B::Item) -> R + Send + Sync,
{
    let zipped = zip(a, b)?;
    map_impl("par_map2", move |(x, y)| f(x, y), zipped, scheduler)
}

/// Writes `f(input[i])` into `out[i]` for every index.
///
/// The output must share the input's index domain. Writes are per-index and
/// race-free because the chunk partition assigns each index to exactly one
/// task; any scheduler is accepted.
pub fn par_map_in_place<I, R, F>(f: F, out: &mut [R], input: I, scheduler: &Scheduler) -> Result<()>
where
    I: IndexedInput,
    R: Send,
    F: Fn(I::Item) -> R + Send + Sync,
{
    if out.len() != input.len() {
        return Err(Error::domain_mismatch(format!(
            "output holds {} elements, input has {}",
            out.len(),
            input.len()
        )));
    }
    let out = SharedOut::new(out);
    drive_for_each(&input, scheduler, &move |index, item| out.set(index, f(item)))
}

/// Materializes an input (a range, a zip, …) into a vector, in input order.
///
/// Subject to the same order discipline as [`par_map`].
pub fn par_collect<I>(input: I, scheduler: &Scheduler) -> Result<Vec<I::Item>>
where
    I: IndexedInput,
{
    map_impl("par_collect", |item| item, input, scheduler)
}

/// Reduces the input with `op`.
///
/// Without `init` an empty input is [`Error::EmptyReduction`]; with `init`
/// it returns `init`. Under the greedy scheduler `init` seeds every worker,
/// so it must be an identity element for `op`; the chunked schedulers apply
/// it exactly once.
pub fn par_reduce<I, Op>(
    op: Op,
    input: I,
    scheduler: &Scheduler,
    init: Option<I::Item>,
) -> Result<I::Item>
where
    I: IndexedInput,
    I::Item: Clone,
    Op: Fn(I::Item, I::Item) -> I::Item + Send + Sync,
{
    par_map_reduce(|item| item, op, input, scheduler, init)
}

/// Maps every element through `f` and reduces the results with `op`.
///
/// Each chunk task runs a local sequential map-reduce; the caller folds the
/// partial results in chunk-index order. `init` behaves as in
/// [`par_reduce`].
pub fn par_map_reduce<I, R, F, Op>(
    f: F,
    op: Op,
    input: I,
    scheduler: &Scheduler,
    init: Option<R>,
) -> Result<R>
where
    I: IndexedInput,
    R: Send + Clone,
    F: Fn(I::Item) -> R + Send + Sync,
    Op: Fn(R, R) -> R + Send + Sync,
{
    match scheduler {
        Scheduler::Serial => serial::map_reduce_all(&f, &op, &input, init),
        Scheduler::Dynamic(config) => chunked_map_reduce(
            &f,
            &op,
            &input,
            init,
            config.chunking(),
            chunked::Placement::Pool(config.pool()),
            config.pool(),
        ),
        Scheduler::Static(config) => chunked_map_reduce(
            &f,
            &op,
            &input,
            init,
            config.chunking(),
            chunked::Placement::Pinned,
            PoolKind::Default,
        ),
        Scheduler::Greedy(config) => greedy_map_reduce(&f, &op, &input, init, config),
    }
}

/// Map-reduce over a length-unknown iterator.
///
/// Only the greedy scheduler without chunking can consume an iterator: a
/// feeder thread drains it into a bounded buffer and the workers pull from
/// there (a pull may block while the feeder catches up). Any other scheduler
/// is [`Error::UnsupportedInput`].
pub fn par_map_reduce_iter<It, R, F, Op>(
    f: F,
    op: Op,
    items: It,
    scheduler: &Scheduler,
    init: Option<R>,
) -> Result<R>
where
    It: IntoIterator,
    It::Item: Send + 'static,
    It::IntoIter: Send + 'static,
    R: Send + Clone,
    F: Fn(It::Item) -> R + Send + Sync,
    Op: Fn(R, R) -> R + Send + Sync,
{
    let config = match scheduler {
        Scheduler::Greedy(config) => config,
        _ => {
            return Err(Error::unsupported_input(
                "length-unknown inputs require the greedy scheduler",
            ));
        }
    };
    if config.effective_chunking().is_some() {
        return Err(Error::unsupported_input(
            "greedy chunking needs a length-known input",
        ));
    }
    let tasks = greedy_task_count(config)?;
    let dispenser = FeederDispenser::new(items, FEEDER_CAPACITY);
    trace!("greedy map-reduce over a feeder with {tasks} workers");
    let partials = greedy::run_workers(tasks, &|| dispenser.next(), &|item| Some(f(item)), &op, init)?;
    serial::fold_partials(&op, partials.into_iter().flatten(), None)
}

fn map_impl<I, R, F>(operation: &str, f: F, input: I, scheduler: &Scheduler) -> Result<Vec<R>>
where
    I: IndexedInput,
    R: Send,
    F: Fn(I::Item) -> R + Send + Sync,
{
    // Nothing to map means nothing to order: empty inputs degrade to the
    // sequential no-op under every scheduler.
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let (chunking, placement, pool) = match scheduler {
        Scheduler::Serial => return Ok(serial::map_all(&f, &input)),
        Scheduler::Dynamic(config) => (
            config.chunking(),
            chunked::Placement::Pool(config.pool()),
            config.pool(),
        ),
        Scheduler::Static(config) => (
            config.chunking(),
            chunked::Placement::Pinned,
            PoolKind::Default,
        ),
        Scheduler::Greedy(_) => {
            return Err(Error::order_required(format!(
                "{operation} produces results in input order; the greedy scheduler folds in completion order"
            )));
        }
    };
    let plan = resolve_plan(&input, chunking, pool)?;
    require_input_order(operation, &plan)?;
    if plan.chunk_count() < 2 {
        return Ok(serial::map_all(&f, &input));
    }
    let partials = chunked::run_chunks(&plan, placement, |chunk| {
        serial::map_chunk(&f, &input, &chunk)
    })?;
    Ok(partials.into_iter().flatten().collect())
}

fn drive_for_each<I, G>(input: &I, scheduler: &Scheduler, g: &G) -> Result<()>
where
    I: IndexedInput,
    G: Fn(usize, I::Item) + Send + Sync,
{
    match scheduler {
        Scheduler::Serial => {
            serial::visit_all(g, input);
            Ok(())
        }
        Scheduler::Dynamic(config) => {
            let plan = resolve_plan(input, config.chunking(), config.pool())?;
            if plan.chunk_count() < 2 {
                serial::visit_all(g, input);
                return Ok(());
            }
            chunked::run_chunks(&plan, chunked::Placement::Pool(config.pool()), |chunk| {
                serial::visit_chunk(g, input, &chunk)
            })?;
            Ok(())
        }
        Scheduler::Static(config) => {
            let plan = resolve_plan(input, config.chunking(), PoolKind::Default)?;
            if plan.chunk_count() < 2 {
                serial::visit_all(g, input);
                return Ok(());
            }
            chunked::run_chunks(&plan, chunked::Placement::Pinned, |chunk| {
                serial::visit_chunk(g, input, &chunk)
            })?;
            Ok(())
        }
        Scheduler::Greedy(config) => {
            if input.is_empty() {
                return Ok(());
            }
            match greedy_plan(input, config)? {
                Some(plan) if plan.chunk_count() < 2 => {
                    serial::visit_all(g, input);
                    Ok(())
                }
                Some(plan) => {
                    let dispenser = WorkDispenser::from_plan(&plan);
                    let tasks = greedy_task_count(config)?.min(plan.chunk_count());
                    greedy::run_workers(
                        tasks,
                        &|| dispenser.next(),
                        &|chunk: Chunk| {
                            serial::visit_chunk(g, input, &chunk);
                            Some(())
                        },
                        &|_, _| (),
                        None,
                    )?;
                    Ok(())
                }
                None => {
                    let len = input.len();
                    if len < 2 {
                        serial::visit_all(g, input);
                        return Ok(());
                    }
                    let dispenser = IndexDispenser::new(len);
                    let tasks = greedy_task_count(config)?.min(len);
                    greedy::run_workers(
                        tasks,
                        &|| dispenser.next(),
                        &|index| {
                            g(index, input.index(index));
                            Some(())
                        },
                        &|_, _| (),
                        None,
                    )?;
                    Ok(())
                }
            }
        }
    }
}

fn chunked_map_reduce<I, R, F, Op>(
    f: &F,
    op: &Op,
    input: &I,
    init: Option<R>,
    chunking: &Chunking,
    placement: chunked::Placement,
    pool: PoolKind,
) -> Result<R>
where
    I: IndexedInput,
    R: Send + Clone,
    F: Fn(I::Item) -> R + Send + Sync,
    Op: Fn(R, R) -> R + Send + Sync,
{
    let plan = resolve_plan(input, chunking, pool)?;
    if plan.chunk_count() < 2 {
        return serial::map_reduce_all(f, op, input, init);
    }
    let partials = chunked::run_chunks(&plan, placement, |chunk| {
        serial::map_reduce_chunk(f, op, input, &chunk)
    })?;
    serial::fold_partials(op, partials.into_iter().flatten(), init)
}

fn greedy_map_reduce<I, R, F, Op>(
    f: &F,
    op: &Op,
    input: &I,
    init: Option<R>,
    config: &Greedy,
) -> Result<R>
where
    I: IndexedInput,
    R: Send + Clone,
    F: Fn(I::Item) -> R + Send + Sync,
    Op: Fn(R, R) -> R + Send + Sync,
{
    if input.is_empty() {
        return init.ok_or(Error::EmptyReduction);
    }
    match greedy_plan(input, config)? {
        Some(plan) if plan.chunk_count() < 2 => serial::map_reduce_all(f, op, input, init),
        Some(plan) => {
            let dispenser = WorkDispenser::from_plan(&plan);
            let tasks = greedy_task_count(config)?.min(plan.chunk_count());
            trace!("greedy map-reduce: {tasks} workers over {} chunks", plan.chunk_count());
            let partials = greedy::run_workers(
                tasks,
                &|| dispenser.next(),
                &|chunk: Chunk| serial::map_reduce_chunk(f, op, input, &chunk),
                op,
                init,
            )?;
            serial::fold_partials(op, partials.into_iter().flatten(), None)
        }
        None => {
            let len = input.len();
            if len < 2 {
                return serial::map_reduce_all(f, op, input, init);
            }
            let dispenser = IndexDispenser::new(len);
            let tasks = greedy_task_count(config)?.min(len);
            trace!("greedy map-reduce: {tasks} workers over {len} elements");
            let partials = greedy::run_workers(
                tasks,
                &|| dispenser.next(),
                &|index| Some(f(input.index(index))),
                op,
                init,
            )?;
            serial::fold_partials(op, partials.into_iter().flatten(), None)
        }
    }
}

/// The plan an operation partitions its input with: the input's attached
/// plan when present (rejecting schedulers that also customize chunking),
/// otherwise a plan derived from the scheduler's options.
fn resolve_plan<I: IndexedInput>(input: &I, chunking: &Chunking, pool: PoolKind) -> Result<ChunkPlan> {
    if let Some(plan) = input.attached_plan() {
        if chunking.is_customized() {
            return Err(Error::ConflictingChunking);
        }
        return Ok(plan.clone());
    }
    chunking.plan(input.len(), Runtime::global().worker_count(pool))
}

fn greedy_plan<I: IndexedInput>(input: &I, config: &Greedy) -> Result<Option<ChunkPlan>> {
    if let Some(plan) = input.attached_plan() {
        if config.chunking_customized() {
            return Err(Error::ConflictingChunking);
        }
        return Ok(Some(plan.clone()));
    }
    match config.effective_chunking() {
        Some(options) => {
            let workers = Runtime::global().worker_count(PoolKind::Default);
            Ok(Some(options.plan(input.len(), workers)?))
        }
        None => Ok(None),
    }
}

fn greedy_task_count(config: &Greedy) -> Result<usize> {
    match config.n_tasks() {
        Some(0) => Err(Error::config("n_tasks must be positive")),
        Some(n) => Ok(n),
        None => Ok(Runtime::global().worker_count(PoolKind::Default)),
    }
}

fn require_input_order(operation: &str, plan: &ChunkPlan) -> Result<()> {
    match plan.split() {
        Split::Consecutive => Ok(()),
        Split::RoundRobin => Err(Error::order_required(format!(
            "{operation} preserves input order and cannot use a round-robin split"
        ))),
    }
}

/// Joins every handle, surfacing the first failure only after all siblings
/// have finished.
fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(handles.len());
    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(value) => results.push(value),
            Err(error) if first_error.is_none() => first_error = Some(error),
            Err(_) => {}
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(results),
    }
}

/// Shared mutable output for disjoint per-index writes.
struct SharedOut<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// Safety: writes go to disjoint indices, one owner per index.
unsafe impl<T: Send> Send for SharedOut<'_, T> {}
unsafe impl<T: Send> Sync for SharedOut<'_, T> {}

impl<'a, T> SharedOut<'a, T> {
    fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Writes `value` at `index`. The chunk partition guarantees each index
    /// is written by exactly one task.
    fn set(&self, index: usize, value: T) {
        assert!(index < self.len, "index {index} out of bounds for length {}", self.len);
        // Safety: in bounds, and no other task writes this index.
        unsafe { *self.ptr.add(index) = value };
    }
}
