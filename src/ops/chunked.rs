//! Spawn-per-chunk execution for the dynamic and static schedulers.

use log::trace;

use crate::chunking::{Chunk, ChunkPlan};
use crate::error::Result;
use crate::runtime::{JoinHandle, PoolKind, Runtime};

use super::join_all;

/// Where chunk tasks are placed.
#[derive(Debug, Clone, Copy)]
pub(super) enum Placement {
    /// Migratable tasks on the named pool.
    Pool(PoolKind),
    /// Chunk `k` pinned to worker `k mod worker_count` of the default pool.
    Pinned,
}

/// Spawns one task per chunk, joins them all, and returns the per-chunk
/// results in chunk-index order.
///
/// Every handle is joined even when an early task fails, so borrows captured
/// by `body` stay valid for the tasks' whole lifetime.
pub(super) fn run_chunks<T, B>(plan: &ChunkPlan, placement: Placement, body: B) -> Result<Vec<T>>
where
    T: Send,
    B: Fn(Chunk) -> T + Send + Sync,
{
    let runtime = Runtime::global();
    trace!("spawning {} chunk tasks", plan.chunk_count());
    let body = &body;
    let handles: Vec<JoinHandle<T>> = plan
        .iter()
        .enumerate()
        .map(|(k, chunk)| {
            // Safety: `join_all` below joins every handle before the borrows
            // captured by `body` can go out of scope.
            match placement {
                Placement::Pool(pool) => unsafe {
                    runtime.spawn_unchecked(pool, move || body(chunk))
                },
                Placement::Pinned => unsafe {
                    runtime.spawn_on_unchecked(k, move || body(chunk))
                },
            }
        })
        .collect();
    join_all(handles)
}
