// Copyright 2025 the Loam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use loam_notify::{Event, EventSource, Listener, ListenerError, PropSet};
use std::cell::Cell;
use std::rc::Rc;

fn counting_listener(hits: &Rc<Cell<u64>>) -> Rc<dyn Listener<u32>> {
    let hits = hits.clone();
    Rc::new(move |_event: &Event<u32>| -> Result<(), ListenerError> {
        hits.set(hits.get() + 1);
        Ok(())
    })
}

fn bench_dispatch_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/dispatch");

    // Hypothesis: dispatch is linear in roster size, with per-listener cost of
    // one handle resolution plus one dynamic call.
    for len in [16usize, 64, 256, 1_024] {
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("strong", len), &len, |b, &len| {
            let source = EventSource::new(0_u32);
            let hits = Rc::new(Cell::new(0_u64));
            for _ in 0..len {
                source.subscribe_strong(counting_listener(&hits));
            }
            b.iter(|| source.fire_with_keys(["tick"], None).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("weak", len), &len, |b, &len| {
            let source = EventSource::new(0_u32);
            let hits = Rc::new(Cell::new(0_u64));
            let keepers: Vec<_> = (0..len)
                .map(|_| {
                    let listener = counting_listener(&hits);
                    source.subscribe(listener.clone());
                    listener
                })
                .collect();
            b.iter(|| source.fire_with_keys(["tick"], None).unwrap());
            black_box(keepers);
        });
    }

    group.finish();
}

fn bench_clone_with_props(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/clone_with_props");

    const KEYS: [&str; 16] = [
        "k00", "k01", "k02", "k03", "k04", "k05", "k06", "k07", "k08", "k09", "k10", "k11", "k12",
        "k13", "k14", "k15",
    ];

    // Hypothesis: the per-fire clone is dominated by copying the property
    // table, not by sharing the registry handle.
    for entries in [1usize, 4, 16] {
        let source = EventSource::new(0_u32);
        let mut props = PropSet::new();
        for &key in &KEYS[..entries] {
            props.insert(key, 1_u32);
        }
        group.throughput(Throughput::Elements(entries as u64));

        group.bench_with_input(BenchmarkId::new("entries", entries), &props, |b, props| {
            b.iter_batched(
                || props.clone(),
                |props| black_box(source.event().clone_with_props(props)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_dispatch_half_dead(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify/half_dead_roster");

    // Half the weak entries are dead at fire time: the pass skips them and the
    // deferred prune compacts the roster once the traversal ends.
    for len in [256usize, 1_024] {
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("fire", len), &len, |b, &len| {
            b.iter_batched(
                || {
                    let source = EventSource::new(0_u32);
                    let hits = Rc::new(Cell::new(0_u64));
                    let mut keepers = Vec::with_capacity(len / 2);
                    for i in 0..len {
                        let listener = counting_listener(&hits);
                        source.subscribe(listener.clone());
                        if i % 2 == 0 {
                            keepers.push(listener);
                        }
                    }
                    (source, keepers)
                },
                |(source, keepers)| {
                    source.fire_with_keys(["tick"], None).unwrap();
                    black_box(keepers);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch_fanout,
    bench_clone_with_props,
    bench_dispatch_half_dead
);
criterion_main!(benches);
