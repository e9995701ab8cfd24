//! Benchmarks for combiner startup and leaf fan-out.
//!
//! Run with: cargo bench -p watchable

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use indexmap::IndexMap;
use std::hint::black_box;
use watchable::{Subject, Watchable, partial_combine};

fn make_inputs(n: usize) -> (Vec<Subject<usize>>, IndexMap<usize, Watchable<usize>>) {
    let subjects: Vec<Subject<usize>> = (0..n).map(Subject::of).collect();
    let keyed = subjects
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.as_watchable()))
        .collect();
    (subjects, keyed)
}

fn bench_combine_startup(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine/startup");

    for n in [10, 100, 1_000, 10_000] {
        let (_subjects, keyed) = make_inputs(n);
        group.bench_with_input(BenchmarkId::new("watch", n), &keyed, |b, keyed| {
            b.iter(|| {
                let combined = partial_combine(keyed);
                let unsub = combined.watch(|m| {
                    black_box(m.len());
                });
                black_box(unsub.map(|u| u.unsubscribe()))
            })
        });
    }

    group.finish();
}

fn bench_combine_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine/update");

    for n in [10, 100, 1_000] {
        let (subjects, keyed) = make_inputs(n);
        let combined = partial_combine(&keyed);
        let _unsub = combined.watch(|m| {
            black_box(m.len());
        });
        let mut next = n;
        group.bench_function(BenchmarkId::new("single_input", n), |b| {
            b.iter(|| {
                next += 1;
                subjects[0].update(black_box(next));
            })
        });
    }

    group.finish();
}

fn bench_leaf_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("subject/fanout");

    for watchers in [1, 10, 100] {
        let subject = Subject::of(0u64);
        let _handles: Vec<_> = (0..watchers)
            .map(|_| {
                subject.watch(|v: &u64| {
                    black_box(*v);
                })
            })
            .collect();
        let mut next = 0u64;
        group.bench_function(BenchmarkId::new("update", watchers), |b| {
            b.iter(|| {
                next += 1;
                subject.update(black_box(next));
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_combine_startup,
    bench_combine_update,
    bench_leaf_fanout
);
criterion_main!(benches);
