//! Work dispensers: hand items to a dynamic set of workers, each item
//! exactly once.
//!
//! The greedy scheduler pulls its work from one of these instead of being
//! assigned chunks up front, so faster workers naturally take more items.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::channel::{self, Receiver};

use crate::chunking::{Chunk, ChunkPlan};

/// Wait-free cursor over a materialized item sequence.
///
/// `next` is a single fetch-and-add on the cursor: across any set of
/// concurrent callers every item is delivered exactly once, and no caller
/// ever blocks.
#[derive(Debug)]
pub struct WorkDispenser<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T: Clone> WorkDispenser<T> {
    /// Wraps the items to dispense.
    pub fn new(items: Vec<T>) -> Self {
        Self { items, cursor: AtomicUsize::new(0) }
    }

    /// Total number of items the dispenser started with.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dispenser started empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Takes the next item, or `None` once the sequence is exhausted.
    pub fn next(&self) -> Option<T> {
        let at = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.items.get(at).cloned()
    }
}

impl WorkDispenser<Chunk> {
    /// Materializes a chunk plan into a dispenser.
    pub fn from_plan(plan: &ChunkPlan) -> Self {
        Self::new(plan.iter().collect())
    }
}

/// Wait-free cursor over the index domain `0..len`.
///
/// Work source for the greedy scheduler without chunking: one element per
/// pull, no materialization.
#[derive(Debug)]
pub struct IndexDispenser {
    len: usize,
    cursor: AtomicUsize,
}

impl IndexDispenser {
    /// Creates a dispenser over `0..len`.
    pub fn new(len: usize) -> Self {
        Self { len, cursor: AtomicUsize::new(0) }
    }

    /// Takes the next index, or `None` once the domain is exhausted.
    pub fn next(&self) -> Option<usize> {
        let at = self.cursor.fetch_add(1, Ordering::SeqCst);
        (at < self.len).then_some(at)
    }
}

/// Channel-fed work source for length-unknown iterators.
///
/// A feeder thread drains the iterator into a bounded channel. Unlike
/// [`WorkDispenser`], `next` may block while the feeder is catching up.
pub struct FeederDispenser<T> {
    rx: Receiver<T>,
}

impl<T: Send + 'static> FeederDispenser<T> {
    /// Spawns the feeder over `iter`; at most `capacity` items are buffered
    /// ahead of the consumers.
    pub fn new<I>(iter: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let (tx, rx) = channel::bounded(capacity);
        let iter = iter.into_iter();
        std::thread::Builder::new()
            .name("parafold-feeder".to_string())
            .spawn(move || {
                for item in iter {
                    // All consumers gone: stop feeding.
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            })
            .expect("failed to spawn feeder thread");
        Self { rx }
    }

    /// Takes the next item, blocking while the feeder catches up; `None`
    /// once the iterator is drained.
    pub fn next(&self) -> Option<T> {
        self.rx.recv().ok()
    }
}
