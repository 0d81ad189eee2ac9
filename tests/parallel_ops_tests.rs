//! End-to-end tests for the parallel operations.
//!
//! These exercise the public surface the way downstream code uses it:
//! every scheduler variant against its sequential equivalent, order and
//! shape guarantees, task-local scratch, and the structured primitives
//! from inside running kernels.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use pretty_assertions::assert_eq;
use rand::Rng;

use parafold::{
    Dynamic, Greedy, OnceRegion, PoolKind, Runtime, Scheduler, Split, Static, TaskLocal,
    par_collect, par_for_each, par_map, par_map2, par_map_in_place, par_map_reduce,
    par_map_reduce_iter, par_reduce,
};

#[test]
fn map_reduce_of_square_roots_matches_the_closed_form() {
    let data = vec![1.0f64, 2.0, 3.0, 4.0, 5.0];
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(2).into();
    let sum = par_map_reduce(|x: &f64| x.sqrt(), |a, b| a + b, &data, &scheduler, None).unwrap();
    assert!((sum - 8.382332347441762).abs() < 1e-9);
}

#[test]
fn static_map_preserves_element_order_bit_for_bit() {
    let scheduler: Scheduler = Static::new().with_n_chunks(3).into();
    let mapped = par_map(|i| (i as f64).sin(), 0..10i64, &scheduler).unwrap();
    let expected: Vec<f64> = (0..10).map(|i| (i as f64).sin()).collect();
    assert_eq!(mapped, expected);
}

#[test]
fn greedy_reduction_over_a_million_elements() {
    let scheduler: Scheduler = Greedy::new().with_n_tasks(8).into();
    let sum = par_reduce(|a, b| a + b, 1..=1_000_000u64, &scheduler, None).unwrap();
    assert_eq!(sum, 500_000_500_000);
}

#[test]
fn map_in_place_writes_every_index_once() {
    let mut out = vec![0usize; 5];
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(5).into();
    par_map_in_place(|i| i * i, &mut out, 0..5usize, &scheduler).unwrap();
    assert_eq!(out, vec![0, 1, 4, 9, 16]);
}

#[test]
fn task_local_scratch_is_allocated_at_most_once_per_worker() {
    const DIM: usize = 4;
    static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
    let scratch: TaskLocal<Vec<f64>> = TaskLocal::new(|| {
        ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        vec![0.0; DIM * DIM]
    });

    let left: Vec<Vec<f64>> = (0..64).map(|m| (0..DIM * DIM).map(|e| (m + e) as f64).collect()).collect();
    let right: Vec<Vec<f64>> = (0..64).map(|m| (0..DIM * DIM).map(|e| (m * e) as f64).collect()).collect();

    let product_sum = |a: &Vec<f64>, b: &Vec<f64>, buffer: &mut Vec<f64>| -> f64 {
        for row in 0..DIM {
            for col in 0..DIM {
                let mut cell = 0.0;
                for k in 0..DIM {
                    cell += a[row * DIM + k] * b[k * DIM + col];
                }
                buffer[row * DIM + col] = cell;
            }
        }
        buffer.iter().sum()
    };

    let scratch = &scratch;
    let sums = par_map2(
        move |a: &Vec<f64>, b: &Vec<f64>| scratch.with(|buffer| product_sum(a, b, buffer)),
        &left,
        &right,
        &Scheduler::dynamic(),
    )
    .unwrap();

    let mut baseline_buffer = vec![0.0; DIM * DIM];
    let baseline: Vec<f64> = left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| product_sum(a, b, &mut baseline_buffer))
        .collect();
    assert_eq!(sums, baseline);

    let workers = Runtime::global().worker_count(PoolKind::Default);
    assert!(ALLOCATIONS.load(Ordering::SeqCst) <= workers);
}

#[test]
fn once_region_runs_once_across_kernel_tasks() {
    let region = OnceRegion::new();
    let counter = AtomicUsize::new(0);
    let (region, counter) = (&region, &counter);
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(10).into();
    par_for_each(
        move |_i| {
            region.try_enter(|| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        },
        0..10usize,
        &scheduler,
    )
    .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn all_schedulers_agree_on_a_commutative_reduction() {
    let mut rng = rand::thread_rng();
    let data: Vec<u64> = (0..1000).map(|_| rng.gen_range(0..1000)).collect();

    let expected = par_map_reduce(|x: &u64| *x, |a, b| a + b, &data, &Scheduler::serial(), None).unwrap();
    let schedulers: Vec<Scheduler> = vec![
        Dynamic::new().with_n_chunks(7).into(),
        Dynamic::new().with_chunk_size(13).into(),
        Dynamic::new().with_n_chunks(8).with_min_chunk_size(100).into(),
        Static::new().with_n_chunks(5).into(),
        Dynamic::new().with_n_chunks(6).with_split(Split::RoundRobin).into(),
        Static::new().with_n_chunks(3).with_split(Split::RoundRobin).into(),
        Greedy::new().with_n_tasks(4).into(),
        Greedy::new().with_n_tasks(4).with_n_chunks(16).into(),
        Greedy::new().with_chunk_size(64).into(),
    ];
    for scheduler in &schedulers {
        let sum = par_map_reduce(|x: &u64| *x, |a, b| a + b, &data, scheduler, None).unwrap();
        assert_eq!(sum, expected);
    }
}

#[test]
fn map_output_has_the_input_shape() {
    let data: Vec<i32> = (-50..50).collect();
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(4).into();
    let mapped = par_map(|x: &i32| x * 2, &data, &scheduler).unwrap();
    assert_eq!(mapped.len(), data.len());
    for (index, value) in mapped.iter().enumerate() {
        assert_eq!(*value, data[index] * 2);
    }
}

#[test]
fn collect_materializes_ranges_in_order() {
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(3).into();
    let collected = par_collect(10..20u32, &scheduler).unwrap();
    assert_eq!(collected, (10..20).collect::<Vec<_>>());
}

#[test]
fn single_chunk_operations_run_on_the_caller_thread() {
    let caller = thread::current().id();
    let data: Vec<u32> = (0..100).collect();
    let single: Scheduler = Dynamic::new().with_n_chunks(1).into();
    let threads = par_map(move |_x: &u32| thread::current().id(), &data, &single).unwrap();
    assert!(threads.iter().all(|id| *id == caller));

    let serial = Scheduler::serial();
    let threads = par_map(move |_x: &u32| thread::current().id(), &data, &serial).unwrap();
    assert!(threads.iter().all(|id| *id == caller));
}

#[test]
fn multi_chunk_operations_leave_the_caller_thread() {
    let caller = thread::current().id();
    let data: Vec<u32> = (0..100).collect();
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(4).into();
    let threads = par_map(move |_x: &u32| thread::current().id(), &data, &scheduler).unwrap();
    assert!(threads.iter().all(|id| *id != caller));
}

#[test]
fn static_chunks_wrap_onto_the_same_workers() {
    let workers = Runtime::global().worker_count(PoolKind::Default);
    let elements = workers * 2;
    // One element per chunk, so element k runs pinned to worker k mod workers.
    let scheduler: Scheduler = Static::new().with_n_chunks(elements).into();
    let threads = par_map(|_i| thread::current().id(), 0..elements, &scheduler).unwrap();
    for k in 0..workers {
        assert_eq!(threads[k], threads[k + workers]);
    }
}

#[test]
fn the_interactive_pool_is_selectable() {
    let scheduler: Scheduler = Dynamic::new()
        .with_pool(PoolKind::Interactive)
        .with_n_chunks(2)
        .into();
    let sum = par_reduce(|a, b| a + b, 0..100u64, &scheduler, None).unwrap();
    assert_eq!(sum, 4950);
}

#[test]
fn iterator_fed_greedy_reduction_agrees_with_the_direct_form() {
    let scheduler: Scheduler = Greedy::new().with_n_tasks(4).into();
    let via_iter = par_map_reduce_iter(
        |x: u64| x * x,
        |a, b| a + b,
        (0..1000u64).filter(|x| x % 3 == 0),
        &scheduler,
        None,
    )
    .unwrap();
    let expected: u64 = (0..1000u64).filter(|x| x % 3 == 0).map(|x| x * x).sum();
    assert_eq!(via_iter, expected);
}

#[test]
fn greedy_reduction_with_an_identity_seed() {
    let scheduler: Scheduler = Greedy::new().with_n_tasks(8).into();
    let sum = par_reduce(|a, b| a + b, 1..=100u64, &scheduler, Some(0)).unwrap();
    assert_eq!(sum, 5050);
}

#[test]
fn zipped_inputs_map_in_lockstep() {
    let a: Vec<u64> = (0..256).collect();
    let b: Vec<u64> = (0..256).rev().collect();
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(8).into();
    let sums = par_map2(|x: &u64, y: &u64| x + y, &a, &b, &scheduler).unwrap();
    assert!(sums.iter().all(|total| *total == 255));
}
