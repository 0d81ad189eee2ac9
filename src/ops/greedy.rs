//! Pull-loop execution for the greedy scheduler.

use crate::error::Result;
use crate::runtime::{JoinHandle, PoolKind, Runtime};

use super::join_all;

/// Spawns `n_workers` pull-loop tasks on the default pool.
///
/// Each worker starts its accumulator from the seed (when given), folds in
/// every item it manages to pull, and yields the accumulator. A worker that
/// pulled nothing and had no seed yields `None`; the caller drops those from
/// the final fold, which keeps the greedy path equivalent to a sequential
/// reduce whenever there is at least one work item.
pub(super) fn run_workers<W, R, P, K, Op>(
    n_workers: usize,
    pull: &P,
    kernel: &K,
    op: &Op,
    init: Option<R>,
) -> Result<Vec<Option<R>>>
where
    W: Send,
    R: Send + Clone,
    P: Fn() -> Option<W> + Send + Sync,
    K: Fn(W) -> Option<R> + Send + Sync,
    Op: Fn(R, R) -> R + Send + Sync,
{
    let runtime = Runtime::global();
    let handles: Vec<JoinHandle<Option<R>>> = (0..n_workers)
        .map(|_| {
            let seed = init.clone();
            // Safety: `join_all` below joins every handle before the borrows
            // captured by the worker closure can go out of scope.
            unsafe {
                runtime.spawn_unchecked(PoolKind::Default, move || {
                    let mut accumulator = seed;
                    while let Some(item) = pull() {
                        if let Some(value) = kernel(item) {
                            accumulator = Some(match accumulator.take() {
                                Some(current) => op(current, value),
                                None => value,
                            });
                        }
                    }
                    accumulator
                })
            }
        })
        .collect();
    join_all(handles)
}
