//! # parafold
//!
//! A data-parallel task framework: for-each, map, reduce, map-reduce, and
//! collect over indexable inputs, executed by a pool of worker threads.
//!
//! You describe what to compute per element and how to combine partial
//! results; the framework decides how to partition the input, how many
//! tasks to spawn, where they run, and how the partials fold into the final
//! value.
//!
//! ## Architecture
//!
//! 1. **Chunking**: a [`ChunkPlan`] partitions the input's index domain
//!    into disjoint chunks (count-based, size-based, consecutive or
//!    round-robin).
//! 2. **Schedulers**: a [`Scheduler`] value picks the execution shape:
//!    serial, dynamic (pooled tasks), static (pinned tasks), or greedy
//!    (pull-loop workers over a [`WorkDispenser`]).
//! 3. **Operations**: [`par_map`], [`par_for_each`], [`par_reduce`],
//!    [`par_map_reduce`], [`par_map_in_place`], and [`par_collect`] combine
//!    a plan, a scheduler, and user kernels into spawned tasks plus a fold.
//! 4. **Kernels** get [`TaskLocal`] scratch values and the structured
//!    primitives in [`sync`] ([`OnceRegion`], [`SerialRegion`],
//!    [`Barrier`]) when they need to coordinate.
//!
//! ## Example
//!
//! ```
//! use parafold::{par_map_reduce, Dynamic, Scheduler};
//!
//! let data = vec![1.0f64, 2.0, 3.0, 4.0, 5.0];
//! let scheduler: Scheduler = Dynamic::new().with_n_chunks(2).into();
//! let sum = par_map_reduce(|x: &f64| x.sqrt(), |a, b| a + b, &data, &scheduler, None)?;
//! assert!((sum - 8.382332347441762).abs() < 1e-9);
//! # Ok::<(), parafold::Error>(())
//! ```

#![warn(missing_docs, rust_2018_idioms)]

/// Chunking engine: index-range plans derived from a length and a policy.
pub mod chunking;
/// Work dispensers feeding the greedy scheduler.
pub mod dispenser;
/// Error types shared across the crate.
pub mod error;
/// Indexable input views consumed by the operations.
pub mod input;
/// Parallel operations: the top-level entry points.
pub mod ops;
/// Task runtime: worker pools, joinable tasks, task identity.
pub mod runtime;
/// Scheduler variants consumed by the operations.
pub mod scheduler;
/// Structured synchronization primitives for kernels.
pub mod sync;
/// Task-local scratch values with first-touch initialization.
pub mod task_local;

pub use chunking::{Chunk, ChunkPlan, Chunking, Split};
pub use dispenser::{FeederDispenser, IndexDispenser, WorkDispenser};
pub use error::{Error, Result};
pub use input::{IndexedInput, Planned, Zip, with_plan, zip};
pub use ops::{
    par_collect, par_for_each, par_map, par_map2, par_map_in_place, par_map_reduce,
    par_map_reduce_iter, par_reduce,
};
pub use runtime::{JoinHandle, PoolKind, Runtime, RuntimeStats, TaskId};
pub use scheduler::{Dynamic, Greedy, Scheduler, Static};
pub use sync::{Barrier, BarrierWaitResult, OnceRegion, SerialRegion};
pub use task_local::TaskLocal;
