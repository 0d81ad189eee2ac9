//! Sequential kernels: the fast paths and the per-chunk task bodies.
//!
//! Every parallel operation bottoms out here; a chunk task is nothing more
//! than one of these loops over its chunk's indices.

use crate::chunking::Chunk;
use crate::error::{Error, Result};
use crate::input::IndexedInput;

/// Applies `g(index, element)` across one chunk.
pub(super) fn visit_chunk<I, G>(g: &G, input: &I, chunk: &Chunk)
where
    I: IndexedInput,
    G: Fn(usize, I::Item),
{
    for index in chunk.indices() {
        g(index, input.index(index));
    }
}

/// Applies `g(index, element)` across the whole input.
pub(super) fn visit_all<I, G>(g: &G, input: &I)
where
    I: IndexedInput,
    G: Fn(usize, I::Item),
{
    for index in 0..input.len() {
        g(index, input.index(index));
    }
}

/// Maps one chunk into a vector, in chunk-index order.
pub(super) fn map_chunk<I, R, F>(f: &F, input: &I, chunk: &Chunk) -> Vec<R>
where
    I: IndexedInput,
    F: Fn(I::Item) -> R,
{
    let mut output = Vec::with_capacity(chunk.len());
    for index in chunk.indices() {
        output.push(f(input.index(index)));
    }
    output
}

/// Maps the whole input sequentially.
pub(super) fn map_all<I, R, F>(f: &F, input: &I) -> Vec<R>
where
    I: IndexedInput,
    F: Fn(I::Item) -> R,
{
    (0..input.len()).map(|index| f(input.index(index))).collect()
}

/// Map-reduces one chunk; `None` only for an empty chunk, which the planner
/// never produces.
pub(super) fn map_reduce_chunk<I, R, F, Op>(f: &F, op: &Op, input: &I, chunk: &Chunk) -> Option<R>
where
    I: IndexedInput,
    F: Fn(I::Item) -> R,
    Op: Fn(R, R) -> R,
{
    let mut accumulator = None;
    for index in chunk.indices() {
        let value = f(input.index(index));
        accumulator = Some(match accumulator.take() {
            Some(current) => op(current, value),
            None => value,
        });
    }
    accumulator
}

/// Whole-input sequential map-reduce with the empty-input contract.
pub(super) fn map_reduce_all<I, R, F, Op>(f: &F, op: &Op, input: &I, init: Option<R>) -> Result<R>
where
    I: IndexedInput,
    F: Fn(I::Item) -> R,
    Op: Fn(R, R) -> R,
{
    fold_partials(op, (0..input.len()).map(|index| f(input.index(index))), init)
}

/// Folds partial results in order, seeding from `init` when given.
pub(super) fn fold_partials<R, Op>(
    op: &Op,
    partials: impl IntoIterator<Item = R>,
    init: Option<R>,
) -> Result<R>
where
    Op: Fn(R, R) -> R,
{
    let mut accumulator = init;
    for partial in partials {
        accumulator = Some(match accumulator.take() {
            Some(current) => op(current, partial),
            None => partial,
        });
    }
    accumulator.ok_or(Error::EmptyReduction)
}
