//! Worker pool internals: a shared queue per pool plus a private queue per
//! worker for pinned tasks.

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use log::debug;

use super::Job;

pub(crate) struct WorkerPool {
    shared: Sender<Job>,
    pinned: Vec<Sender<Job>>,
}

impl WorkerPool {
    /// Starts `workers` threads named `{name}-{index}`. Workers exit when
    /// every sender to their queues is gone.
    pub(crate) fn new(name: &str, workers: usize) -> Self {
        let (shared, shared_rx) = channel::unbounded::<Job>();
        let mut pinned = Vec::with_capacity(workers);
        for index in 0..workers {
            let (pinned_tx, pinned_rx) = channel::unbounded::<Job>();
            pinned.push(pinned_tx);
            let shared_rx = shared_rx.clone();
            std::thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || worker_loop(shared_rx, pinned_rx))
                .expect("failed to spawn pool worker");
        }
        debug!("started pool {name} with {workers} workers");
        Self { shared, pinned }
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.pinned.len()
    }

    pub(crate) fn push(&self, job: Job) {
        // Workers outlive every sender, so the queue cannot be closed here.
        let _ = self.shared.send(job);
    }

    pub(crate) fn push_pinned(&self, index: usize, job: Job) {
        let slot = index % self.pinned.len();
        let _ = self.pinned[slot].send(job);
    }
}

fn worker_loop(mut shared: Receiver<Job>, mut pinned: Receiver<Job>) {
    let mut shared_open = true;
    let mut pinned_open = true;
    while shared_open || pinned_open {
        select! {
            recv(shared) -> message => match message {
                Ok(job) => job.run(),
                Err(_) => {
                    shared_open = false;
                    shared = channel::never();
                }
            },
            recv(pinned) -> message => match message {
                Ok(job) => job.run(),
                Err(_) => {
                    pinned_open = false;
                    pinned = channel::never();
                }
            },
        }
    }
}
