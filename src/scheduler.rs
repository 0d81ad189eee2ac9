//! Scheduler variants: policy values consumed by the parallel operations.
//!
//! A scheduler is an immutable, cheaply clonable configuration value. It
//! carries everything an operation needs to decide how to partition the
//! input and where to place the resulting tasks; the operation itself does
//! the spawning.

use crate::chunking::{Chunking, Split};
use crate::runtime::PoolKind;

/// Scheduling policy for a parallel operation.
///
/// `Dynamic` is the default. `Serial` is the degenerate fast path: the
/// operation runs on the caller thread with no concurrency at all.
#[derive(Debug, Clone)]
pub enum Scheduler {
    /// Run on the caller thread; no tasks are spawned.
    Serial,
    /// Cooperative tasks on a named pool; tasks may run on any worker.
    Dynamic(Dynamic),
    /// Each chunk pinned to a fixed worker: `chunk_index mod worker_count`.
    Static(Static),
    /// A fixed set of workers pulling work on demand; results fold in
    /// completion order, so reducers must be commutative.
    Greedy(Greedy),
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::Dynamic(Dynamic::new())
    }
}

impl Scheduler {
    /// The serial scheduler.
    pub fn serial() -> Self {
        Scheduler::Serial
    }

    /// The dynamic scheduler with default pool and chunking.
    pub fn dynamic() -> Self {
        Scheduler::Dynamic(Dynamic::new())
    }
}

impl From<Dynamic> for Scheduler {
    fn from(config: Dynamic) -> Self {
        Scheduler::Dynamic(config)
    }
}

impl From<Static> for Scheduler {
    fn from(config: Static) -> Self {
        Scheduler::Static(config)
    }
}

impl From<Greedy> for Scheduler {
    fn from(config: Greedy) -> Self {
        Scheduler::Greedy(config)
    }
}

/// Configuration of the dynamic scheduler.
#[derive(Debug, Clone, Default)]
pub struct Dynamic {
    pool: PoolKind,
    chunking: Chunking,
}

impl Dynamic {
    /// Default-pool scheduler with default chunking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the pool tasks are spawned on.
    pub fn with_pool(mut self, pool: PoolKind) -> Self {
        self.pool = pool;
        self
    }

    /// Replaces the chunking policy wholesale.
    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = chunking;
        self
    }

    /// Enables or disables chunking; disabled means one chunk, one task.
    pub fn with_chunking_enabled(mut self, enabled: bool) -> Self {
        self.chunking = self.chunking.with_enabled(enabled);
        self
    }

    /// Requests a fixed number of chunks.
    pub fn with_n_chunks(mut self, n_chunks: usize) -> Self {
        self.chunking = self.chunking.with_n_chunks(n_chunks);
        self
    }

    /// Requests chunks of a fixed size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunking = self.chunking.with_chunk_size(chunk_size);
        self
    }

    /// Sets the split shape.
    pub fn with_split(mut self, split: Split) -> Self {
        self.chunking = self.chunking.with_split(split);
        self
    }

    /// Floors the number of elements a chunk may hold.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.chunking = self.chunking.with_min_chunk_size(min_chunk_size);
        self
    }

    pub(crate) fn pool(&self) -> PoolKind {
        self.pool
    }

    pub(crate) fn chunking(&self) -> &Chunking {
        &self.chunking
    }
}

/// Configuration of the static scheduler.
///
/// Identical to [`Dynamic`] except that chunk `k` is pinned to worker
/// `k mod worker_count` of the default pool and never migrates. Worth it
/// when the workload is uniform enough that scheduling overhead dominates.
#[derive(Debug, Clone, Default)]
pub struct Static {
    chunking: Chunking,
}

impl Static {
    /// Static scheduler with default chunking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the chunking policy wholesale.
    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = chunking;
        self
    }

    /// Enables or disables chunking; disabled means one chunk, one task.
    pub fn with_chunking_enabled(mut self, enabled: bool) -> Self {
        self.chunking = self.chunking.with_enabled(enabled);
        self
    }

    /// Requests a fixed number of chunks.
    pub fn with_n_chunks(mut self, n_chunks: usize) -> Self {
        self.chunking = self.chunking.with_n_chunks(n_chunks);
        self
    }

    /// Requests chunks of a fixed size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunking = self.chunking.with_chunk_size(chunk_size);
        self
    }

    /// Sets the split shape.
    pub fn with_split(mut self, split: Split) -> Self {
        self.chunking = self.chunking.with_split(split);
        self
    }

    /// Floors the number of elements a chunk may hold.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.chunking = self.chunking.with_min_chunk_size(min_chunk_size);
        self
    }

    pub(crate) fn chunking(&self) -> &Chunking {
        &self.chunking
    }
}

/// Configuration of the greedy scheduler.
///
/// Spawns up to `n_tasks` pull-loop workers (default: the default pool's
/// worker count) over a work dispenser. Without chunking each pull takes one
/// element; with chunking each pull takes a chunk. Work assignment order is
/// nondeterministic, so reducers must be commutative.
#[derive(Debug, Clone, Default)]
pub struct Greedy {
    n_tasks: Option<usize>,
    chunking: Option<Chunking>,
}

impl Greedy {
    /// Greedy scheduler without chunking, one worker per pool thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed number of pull-loop workers.
    pub fn with_n_tasks(mut self, n_tasks: usize) -> Self {
        self.n_tasks = Some(n_tasks);
        self
    }

    /// Enables chunked work items with the given policy.
    pub fn with_chunking(mut self, chunking: Chunking) -> Self {
        self.chunking = Some(chunking);
        self
    }

    /// Enables or disables chunked work items.
    pub fn with_chunking_enabled(mut self, enabled: bool) -> Self {
        self.chunking = Some(
            self.chunking
                .take()
                .unwrap_or_default()
                .with_enabled(enabled),
        );
        self
    }

    /// Enables chunking with a fixed chunk count.
    pub fn with_n_chunks(mut self, n_chunks: usize) -> Self {
        self.chunking = Some(self.chunking.take().unwrap_or_default().with_n_chunks(n_chunks));
        self
    }

    /// Enables chunking with a fixed chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunking = Some(
            self.chunking
                .take()
                .unwrap_or_default()
                .with_chunk_size(chunk_size),
        );
        self
    }

    /// Floors the number of elements a chunk may hold.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.chunking = Some(
            self.chunking
                .take()
                .unwrap_or_default()
                .with_min_chunk_size(min_chunk_size),
        );
        self
    }

    pub(crate) fn n_tasks(&self) -> Option<usize> {
        self.n_tasks
    }

    /// Whether the user touched the chunking options at all.
    pub(crate) fn chunking_customized(&self) -> bool {
        self.chunking.is_some()
    }

    /// The chunking policy, unless chunking is off (the default).
    pub(crate) fn effective_chunking(&self) -> Option<&Chunking> {
        self.chunking.as_ref().filter(|options| options.is_enabled())
    }
}
