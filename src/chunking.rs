//! Chunking engine: derives index ranges from an input length and a policy.
//!
//! A [`ChunkPlan`] is a pure function of `(length, options)`: planning the
//! same inputs twice yields the same chunks, iterating a plan twice yields
//! the same sequence, and the chunks always partition `[0, length)` into
//! non-empty, pairwise disjoint pieces.

use std::ops::Range;

use crate::error::{Error, Result};

/// Shape of chunk assignment over the index domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Split {
    /// Chunk `k` owns a contiguous index range; ranges cover the input in
    /// index order.
    #[default]
    Consecutive,
    /// Chunk `k` owns the indices congruent to `k` modulo the chunk count.
    RoundRobin,
}

/// Chunking policy carried by a scheduler.
///
/// `n_chunks` and `chunk_size` are mutually exclusive; `min_chunk_size`
/// floors the effective chunk count for count-based plans; disabling
/// chunking collapses the plan to a single chunk. Unset options fall back
/// to the scheduler defaults (chunking enabled, one chunk per pool worker,
/// consecutive split).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunking {
    enabled: Option<bool>,
    n_chunks: Option<usize>,
    chunk_size: Option<usize>,
    split: Option<Split>,
    min_chunk_size: Option<usize>,
}

impl Chunking {
    /// Creates the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables chunking.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Requests a fixed number of chunks.
    pub fn with_n_chunks(mut self, n_chunks: usize) -> Self {
        self.n_chunks = Some(n_chunks);
        self
    }

    /// Requests chunks of a fixed size (the last chunk may be smaller).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Sets the split shape.
    pub fn with_split(mut self, split: Split) -> Self {
        self.split = Some(split);
        self
    }

    /// Sets the minimum number of elements a chunk may hold.
    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = Some(min_chunk_size);
        self
    }

    /// Whether any option deviates from the scheduler defaults.
    pub(crate) fn is_customized(&self) -> bool {
        self.enabled.is_some()
            || self.n_chunks.is_some()
            || self.chunk_size.is_some()
            || self.split.is_some()
            || self.min_chunk_size.is_some()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    fn split(&self) -> Split {
        self.split.unwrap_or_default()
    }

    /// Validates the options and derives a plan for `len` elements.
    ///
    /// `default_chunks` is the chunk count used when neither `n_chunks` nor
    /// `chunk_size` is set (one chunk per pool worker).
    pub fn plan(&self, len: usize, default_chunks: usize) -> Result<ChunkPlan> {
        self.validate()?;
        if !self.is_enabled() {
            return Ok(ChunkPlan::single(len));
        }
        let min = self.min_chunk_size.unwrap_or(1);
        let count = match (self.n_chunks, self.chunk_size) {
            (Some(n), None) => count_based(len, n, min),
            (None, Some(size)) => len.div_ceil(size),
            (None, None) => count_based(len, default_chunks.max(1), min),
            (Some(_), Some(_)) => {
                return Err(Error::config(
                    "n_chunks and chunk_size are mutually exclusive",
                ));
            }
        };
        Ok(ChunkPlan::new(len, count, self.split()))
    }

    fn validate(&self) -> Result<()> {
        if self.n_chunks == Some(0) {
            return Err(Error::config("n_chunks must be positive"));
        }
        if self.chunk_size == Some(0) {
            return Err(Error::config("chunk_size must be positive"));
        }
        if self.min_chunk_size == Some(0) {
            return Err(Error::config("min_chunk_size must be at least 1"));
        }
        Ok(())
    }
}

/// Effective chunk count for a count-based plan: at most `n`, floored so no
/// chunk falls below `min` elements, and never more chunks than elements.
fn count_based(len: usize, n: usize, min: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if min > 1 {
        n.min(len / min).max(1)
    } else {
        n.min(len)
    }
}

/// A materialized partitioning of `[0, length)` into chunks.
///
/// The plan references the input only by its length. Iteration is
/// restartable and deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    len: usize,
    count: usize,
    split: Split,
}

impl ChunkPlan {
    fn new(len: usize, count: usize, split: Split) -> Self {
        debug_assert!(count <= len);
        Self { len, count, split }
    }

    /// The one-chunk plan covering the whole input.
    pub(crate) fn single(len: usize) -> Self {
        Self::new(len, usize::from(len > 0), Split::Consecutive)
    }

    /// Number of chunks in the plan.
    pub fn chunk_count(&self) -> usize {
        self.count
    }

    /// Number of input elements the plan covers.
    pub fn input_len(&self) -> usize {
        self.len
    }

    /// The split shape the plan was built with.
    pub fn split(&self) -> Split {
        self.split
    }

    /// The `k`-th chunk; `k` must be below [`chunk_count`](Self::chunk_count).
    pub fn chunk(&self, k: usize) -> Chunk {
        debug_assert!(k < self.count);
        match self.split {
            Split::Consecutive => {
                // Even split: the first `len % count` chunks get one extra element.
                let base = self.len / self.count;
                let rem = self.len % self.count;
                let start = k * base + k.min(rem);
                let len = base + usize::from(k < rem);
                Chunk::Contiguous(start..start + len)
            }
            Split::RoundRobin => Chunk::Strided {
                offset: k,
                stride: self.count,
                len: (self.len - k).div_ceil(self.count),
            },
        }
    }

    /// Iterates the chunks in chunk-index order.
    pub fn iter(&self) -> ChunkIter<'_> {
        ChunkIter { plan: self, next: 0 }
    }
}

/// Iterator over a plan's chunks.
#[derive(Debug, Clone)]
pub struct ChunkIter<'a> {
    plan: &'a ChunkPlan,
    next: usize,
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next >= self.plan.chunk_count() {
            return None;
        }
        let chunk = self.plan.chunk(self.next);
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.chunk_count() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIter<'_> {}

/// One chunk of the input's index domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A contiguous index range.
    Contiguous(Range<usize>),
    /// The indices `offset, offset + stride, …`, `len` of them.
    Strided {
        /// First index owned by the chunk.
        offset: usize,
        /// Distance between consecutive indices.
        stride: usize,
        /// Number of indices in the chunk.
        len: usize,
    },
}

impl Chunk {
    /// Number of indices in the chunk.
    pub fn len(&self) -> usize {
        match self {
            Chunk::Contiguous(range) => range.end - range.start,
            Chunk::Strided { len, .. } => *len,
        }
    }

    /// Whether the chunk holds no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the chunk's indices in ascending order.
    pub fn indices(&self) -> ChunkIndices {
        match self {
            Chunk::Contiguous(range) => ChunkIndices {
                next: range.start,
                step: 1,
                remaining: range.end - range.start,
            },
            Chunk::Strided { offset, stride, len } => ChunkIndices {
                next: *offset,
                step: *stride,
                remaining: *len,
            },
        }
    }
}

/// Iterator over a chunk's indices.
#[derive(Debug, Clone)]
pub struct ChunkIndices {
    next: usize,
    step: usize,
    remaining: usize,
}

impl Iterator for ChunkIndices {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.next;
        // The last advance may step past the domain; `remaining` is the bound.
        self.next = index.wrapping_add(self.step);
        self.remaining -= 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ChunkIndices {}
