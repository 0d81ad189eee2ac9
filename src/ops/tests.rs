//! Unit tests for operation dispatch: error paths and fast paths.

use pretty_assertions::assert_eq;

use super::*;
use crate::chunking::Chunking;
use crate::input::with_plan;
use crate::scheduler::{Dynamic, Greedy, Static};

fn dynamic(n_chunks: usize) -> Scheduler {
    Dynamic::new().with_n_chunks(n_chunks).into()
}

#[test]
fn map_rejects_round_robin_splits() {
    let data: Vec<u32> = (0..16).collect();
    let scheduler: Scheduler = Dynamic::new()
        .with_n_chunks(4)
        .with_split(Split::RoundRobin)
        .into();
    assert!(matches!(
        par_map(|x: &u32| x + 1, &data, &scheduler),
        Err(Error::OrderRequired(_))
    ));
}

#[test]
fn map_rejects_the_greedy_scheduler() {
    let data: Vec<u32> = (0..16).collect();
    let scheduler: Scheduler = Greedy::new().into();
    assert!(matches!(
        par_map(|x: &u32| x + 1, &data, &scheduler),
        Err(Error::OrderRequired(_))
    ));
    assert!(matches!(
        par_collect(0..16u32, &scheduler),
        Err(Error::OrderRequired(_))
    ));
}

#[test]
fn round_robin_reduction_is_accepted() {
    let scheduler: Scheduler = Dynamic::new()
        .with_n_chunks(4)
        .with_split(Split::RoundRobin)
        .into();
    let sum = par_reduce(|a, b| a + b, 0..100u64, &scheduler, None).unwrap();
    assert_eq!(sum, 4950);
}

#[test]
fn conflicting_chunking_is_detected_for_every_parallel_scheduler() {
    let data: Vec<u32> = (0..32).collect();
    let plan = Chunking::new().with_n_chunks(4).plan(32, 4).unwrap();

    let customized: Vec<Scheduler> = vec![
        Dynamic::new().with_n_chunks(2).into(),
        Static::new().with_chunk_size(8).into(),
        Greedy::new().with_n_chunks(2).into(),
    ];
    for scheduler in &customized {
        let planned = with_plan(&data, plan.clone()).unwrap();
        assert_eq!(
            par_map_reduce(|x: &u32| *x, |a, b| a + b, planned, scheduler, None).unwrap_err(),
            Error::ConflictingChunking,
        );
    }

    // Default options defer to the attached plan.
    let planned = with_plan(&data, plan).unwrap();
    let largest = par_map_reduce(
        |x: &u32| *x,
        |a, b| if a > b { a } else { b },
        planned,
        &Scheduler::dynamic(),
        None,
    );
    assert_eq!(largest.unwrap(), 31);
}

#[test]
fn invalid_chunking_options_fail_before_spawning() {
    let data: Vec<u32> = (0..8).collect();
    let scheduler: Scheduler = Dynamic::new().with_n_chunks(0).into();
    assert!(matches!(
        par_for_each(|_x: &u32| {}, &data, &scheduler),
        Err(Error::Config(_))
    ));

    let scheduler: Scheduler = Dynamic::new().with_n_chunks(2).with_chunk_size(2).into();
    assert!(matches!(
        par_for_each(|_x: &u32| {}, &data, &scheduler),
        Err(Error::Config(_))
    ));

    let scheduler: Scheduler = Greedy::new().with_n_tasks(0).into();
    assert!(matches!(
        par_reduce(|a, b| a + b, 0..8u32, &scheduler, None),
        Err(Error::Config(_))
    ));
}

#[test]
fn map_in_place_requires_matching_domains() {
    let input: Vec<u32> = (0..8).collect();
    let mut out = vec![0u32; 7];
    assert!(matches!(
        par_map_in_place(|x: &u32| x * x, &mut out, &input, &dynamic(2)),
        Err(Error::DomainMismatch(_))
    ));
}

#[test]
fn map2_requires_matching_domains() {
    let a: Vec<u32> = (0..8).collect();
    let b: Vec<u32> = (0..9).collect();
    assert!(matches!(
        par_map2(|x: &u32, y: &u32| x + y, &a, &b, &dynamic(2)),
        Err(Error::DomainMismatch(_))
    ));
}

#[test]
fn empty_reductions_match_the_sequential_contract() {
    for scheduler in [
        Scheduler::serial(),
        dynamic(4),
        Static::new().with_n_chunks(4).into(),
        Greedy::new().with_n_tasks(4).into(),
    ] {
        assert_eq!(
            par_reduce(|a, b| a + b, 0..0u64, &scheduler, None).unwrap_err(),
            Error::EmptyReduction,
        );
        assert_eq!(
            par_reduce(|a, b| a + b, 0..0u64, &scheduler, Some(7)).unwrap(),
            7,
        );
    }
}

#[test]
fn empty_maps_return_empty_without_spawning() {
    let empty: Vec<u64> = Vec::new();
    // Order discipline does not apply to empty inputs, so the greedy and
    // round-robin schedules succeed here too.
    let schedulers: Vec<Scheduler> = vec![
        Scheduler::serial(),
        dynamic(4),
        Dynamic::new().with_n_chunks(4).with_split(Split::RoundRobin).into(),
        Greedy::new().into(),
    ];
    for scheduler in &schedulers {
        let mapped = par_map(|x: &u64| x + 1, &empty, scheduler).unwrap();
        assert!(mapped.is_empty());
        assert!(par_collect(0..0u32, scheduler).unwrap().is_empty());
        par_for_each(|_x: &u64| unreachable!(), &empty, scheduler).unwrap();
    }
}

#[test]
fn iterator_reduction_requires_greedy_without_chunking() {
    let chunked: Scheduler = Greedy::new().with_n_chunks(4).into();
    assert!(matches!(
        par_map_reduce_iter(|x: u64| x, |a, b| a + b, 0..10u64, &chunked, None),
        Err(Error::UnsupportedInput(_))
    ));
    assert!(matches!(
        par_map_reduce_iter(|x: u64| x, |a, b| a + b, 0..10u64, &Scheduler::dynamic(), None),
        Err(Error::UnsupportedInput(_))
    ));

    let greedy: Scheduler = Greedy::new().with_n_tasks(3).into();
    let sum = par_map_reduce_iter(|x: u64| x, |a, b| a + b, 0..10u64, &greedy, None).unwrap();
    assert_eq!(sum, 45);
}

#[test]
fn kernel_panics_surface_as_kernel_errors() {
    let data: Vec<u32> = (0..64).collect();
    let outcome = par_map(
        |x: &u32| {
            if *x == 40 {
                panic!("bad element");
            }
            x + 1
        },
        &data,
        &dynamic(8),
    );
    assert!(matches!(outcome, Err(Error::Kernel(_))));
}

#[test]
fn greedy_with_more_tasks_than_items_filters_empty_workers() {
    let scheduler: Scheduler = Greedy::new().with_n_tasks(64).into();
    let sum = par_reduce(|a, b| a + b, 1..=3u64, &scheduler, None).unwrap();
    assert_eq!(sum, 6);
}
